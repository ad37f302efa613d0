//! Wire-level constants of the command/response protocol

/// Positive acknowledgment byte
pub const ACK: u8 = 0x06;

/// Negative acknowledgment byte
pub const NACK: u8 = 0x15;

/// Attempts allowed for each phase of a transaction
pub const MAX_RETRY: u8 = 3;

/// Timeout for the single handshake byte after a command (milliseconds)
pub const ACK_TIMEOUT_MS: u64 = 2_000;

/// Timeout for each response frame read (milliseconds)
pub const DATA_TIMEOUT_MS: u64 = 120_000;

/// Control byte plus the 2-byte length field
pub const RESPONSE_HEADER_LENGTH: usize = 3;

/// Size of the handshake reply
pub const RESPONSE_ACK_LENGTH: usize = 1;

/// Terminator plus checksum following the payload
pub const RESPONSE_TRAILER_LENGTH: usize = 2;
