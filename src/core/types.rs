//! Transaction-level data types

use crate::core::constants::{ACK, NACK};
use crate::processing::frame::ResponseFrame;
use std::fmt;

/// A handshake byte as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckByte {
    Ack,
    Nack,
    /// Anything else the peer sent; treated like a NACK
    Other(u8),
}

impl AckByte {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            ACK => AckByte::Ack,
            NACK => AckByte::Nack,
            other => AckByte::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            AckByte::Ack => ACK,
            AckByte::Nack => NACK,
            AckByte::Other(byte) => byte,
        }
    }

    pub fn is_ack(self) -> bool {
        matches!(self, AckByte::Ack)
    }
}

impl fmt::Display for AckByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckByte::Ack => write!(f, "ACK"),
            AckByte::Nack => write!(f, "NACK"),
            AckByte::Other(byte) => write!(f, "0x{:02X}", byte),
        }
    }
}

/// Final state of one command transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Command acknowledged and a valid response accepted
    Success,
    /// No ACK received within the retry budget
    HandshakeFailed,
    /// Handshake succeeded but no valid response was accepted
    ResponseFailed,
}

impl TransactionOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, TransactionOutcome::Success)
    }
}

/// Summary of a finished transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReport {
    pub outcome: TransactionOutcome,
    /// Number of times the command was written
    pub handshake_attempts: u8,
    /// Number of response frames requested (header reads started)
    pub response_attempts: u8,
    /// The accepted response, present only on success
    pub response: Option<ResponseFrame>,
}

impl TransactionReport {
    pub(crate) fn handshake_failed(handshake_attempts: u8) -> Self {
        Self {
            outcome: TransactionOutcome::HandshakeFailed,
            handshake_attempts,
            response_attempts: 0,
            response: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}
