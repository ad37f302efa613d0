//! Hardware abstraction layer for the terminal link
//!
//! The protocol engine talks to the device through the [`Transport`] trait.
//! [`SerialTransport`] drives a real serial port; [`MockTransport`] plays
//! back scripted replies for tests and demos.

pub mod transport;
pub mod serial;
pub mod mock;
pub mod error;

pub use transport::Transport;
pub use serial::SerialTransport;
pub use mock::MockTransport;
pub use error::{CommError, CommResult, RecoveryStrategy};
