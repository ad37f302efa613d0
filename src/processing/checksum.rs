//! Longitudinal redundancy check over response frames

/// XOR checksum used by the terminal protocol
///
/// The checksum covers every frame byte except the leading control byte and
/// the trailing checksum byte itself.
pub struct ChecksumValidator;

impl ChecksumValidator {
    /// XOR of all bytes; `0` for an empty slice
    pub fn compute(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |lrc, &b| lrc ^ b)
    }

    /// Bytes of `frame` covered by the checksum
    ///
    /// Returns `None` for frames too short to carry a control and checksum byte.
    pub fn covered_range(frame: &[u8]) -> Option<&[u8]> {
        if frame.len() < 2 {
            return None;
        }
        Some(&frame[1..frame.len() - 1])
    }

    /// Check the trailing byte of `frame` against the checksum of its covered range
    pub fn validate(frame: &[u8]) -> bool {
        match (Self::covered_range(frame), frame.last()) {
            (Some(covered), Some(&expected)) => Self::compute(covered) == expected,
            _ => false,
        }
    }
}
