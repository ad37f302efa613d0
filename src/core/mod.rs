//! Core protocol constants and transaction types

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
