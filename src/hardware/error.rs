//! Communication error types and handling

use std::io;
use thiserror::Error;

/// Communication error types for the serial link
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommError {
    /// Fewer than the requested bytes arrived before the deadline
    #[error("Read timeout after {timeout_ms}ms ({received}/{expected} bytes)")]
    Timeout {
        timeout_ms: u64,
        expected: usize,
        received: usize,
    },
    /// I/O error the link may recover from (framing, parity, interrupted call)
    #[error("Transport I/O error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },
    /// Device removed or link otherwise unusable
    #[error("Device disconnected: {details}")]
    Disconnected { details: String },
    /// Port could not be opened or configured
    #[error("Failed to open port {port}: {message}")]
    Open { port: String, message: String },
    /// Response header carries a length that cannot be decoded
    #[error("Malformed response header: {details}")]
    MalformedHeader { details: String },
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;

/// What an error says about the link, independent of the transaction phase
///
/// This classifies the error only. The transaction controller decides per
/// phase whether a `Retry` error is worth another attempt: it does in the
/// handshake, but a response frame that cannot be read ends the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// The link is healthy and the same exchange may be attempted again
    Retry,
    /// The bytes received cannot be used
    Abort,
    /// The transport must be reopened by the caller
    Reopen,
}

impl CommError {
    /// Classify a raw I/O error from the transport
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => CommError::Timeout {
                timeout_ms: 0,
                expected: 0,
                received: 0,
            },
            io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => CommError::Disconnected {
                details: err.to_string(),
            },
            kind => CommError::Io {
                kind,
                message: err.to_string(),
            },
        }
    }

    /// Classify this error by what it implies for the link
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CommError::Timeout { .. } => RecoveryStrategy::Retry,
            CommError::Io { .. } => RecoveryStrategy::Retry,
            CommError::MalformedHeader { .. } => RecoveryStrategy::Abort,
            CommError::Disconnected { .. } => RecoveryStrategy::Reopen,
            CommError::Open { .. } => RecoveryStrategy::Reopen,
        }
    }

    /// True when the link itself is broken rather than the peer being slow
    pub fn is_transport_fault(&self) -> bool {
        matches!(self.recovery_strategy(), RecoveryStrategy::Reopen)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CommError::Timeout { .. })
    }
}

impl From<io::Error> for CommError {
    fn from(err: io::Error) -> Self {
        CommError::from_io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let timeout = CommError::from_io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_transport_fault());

        let gone = CommError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        assert!(matches!(gone, CommError::Disconnected { .. }));
        assert!(gone.is_transport_fault());

        let framing = CommError::from_io(io::Error::new(io::ErrorKind::InvalidData, "framing"));
        assert!(matches!(
            framing,
            CommError::Io { kind: io::ErrorKind::InvalidData, .. }
        ));
        assert_eq!(framing.recovery_strategy(), RecoveryStrategy::Retry);
    }

    #[test]
    fn test_recovery_strategies() {
        let header = CommError::MalformedHeader {
            details: "bad digit".to_string(),
        };
        assert_eq!(header.recovery_strategy(), RecoveryStrategy::Abort);
        assert!(!header.is_transport_fault());

        let open = CommError::Open {
            port: "COM4".to_string(),
            message: "busy".to_string(),
        };
        assert!(open.is_transport_fault());

        // A timeout leaves the link usable, whichever phase it happened in
        let timeout = CommError::Timeout {
            timeout_ms: 120_000,
            expected: 3,
            received: 0,
        };
        assert_eq!(timeout.recovery_strategy(), RecoveryStrategy::Retry);
        assert!(!timeout.is_transport_fault());
    }

    #[test]
    fn test_display_includes_progress() {
        let err = CommError::Timeout {
            timeout_ms: 2000,
            expected: 3,
            received: 1,
        };
        assert_eq!(err.to_string(), "Read timeout after 2000ms (1/3 bytes)");
    }
}
