//! Public entry point of the protocol engine

pub mod controller;

pub use controller::CommandTransactionController;
