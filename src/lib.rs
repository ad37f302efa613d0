//! Payment Terminal Link
//!
//! Master-side command/response engine for a payment terminal attached over
//! a serial line. A transaction writes a command, waits for an ACK, then
//! receives a length-prefixed response frame whose LRC is checked before it
//! is acknowledged.

pub mod core;
pub mod processing;
pub mod utils;
pub mod hardware;
pub mod api;

// Re-export commonly used types
pub use crate::core::{AckByte, TransactionOutcome, TransactionReport, ACK, MAX_RETRY, NACK};
pub use crate::processing::{ChecksumValidator, FrameReader, LengthEncoding, ResponseFrame};
pub use crate::hardware::{
    CommError, CommResult, MockTransport, RecoveryStrategy, SerialTransport, Transport,
};
pub use crate::api::CommandTransactionController;
pub use crate::utils::{ConfigError, LinkConfig, ProtocolSettings, SerialSettings};
