//! Frame integrity and response reading

pub mod checksum;
pub mod frame;

pub use checksum::ChecksumValidator;
pub use frame::{FrameReader, LengthEncoding, ResponseFrame};
