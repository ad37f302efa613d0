//! Response frame layout and reader
//!
//! Frame format: `[control:1][length:2][payload:length][terminator:1][checksum:1]`

use crate::core::constants::{RESPONSE_HEADER_LENGTH, RESPONSE_TRAILER_LENGTH};
use crate::hardware::{CommError, CommResult, Transport};
use crate::processing::checksum::ChecksumValidator;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Encoding of the 2-byte length field in the response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthEncoding {
    /// Unsigned 16-bit, most significant byte first
    #[default]
    BigEndian,
    /// Unsigned 16-bit, least significant byte first
    LittleEndian,
    /// Four packed decimal digits, `00 12` meaning twelve
    Bcd,
}

impl LengthEncoding {
    /// Largest payload length the encoding can express
    pub fn max_length(self) -> usize {
        match self {
            LengthEncoding::BigEndian | LengthEncoding::LittleEndian => u16::MAX as usize,
            LengthEncoding::Bcd => 9999,
        }
    }

    pub fn decode(self, field: [u8; 2]) -> CommResult<usize> {
        match self {
            LengthEncoding::BigEndian => Ok(u16::from_be_bytes(field) as usize),
            LengthEncoding::LittleEndian => Ok(u16::from_le_bytes(field) as usize),
            LengthEncoding::Bcd => {
                field
                    .iter()
                    .flat_map(|&b| [b >> 4, b & 0x0F])
                    .try_fold(0usize, |acc, digit| {
                        if digit > 9 {
                            Err(CommError::MalformedHeader {
                                details: format!(
                                    "length field {:02X}{:02X} is not decimal",
                                    field[0], field[1]
                                ),
                            })
                        } else {
                            Ok(acc * 10 + digit as usize)
                        }
                    })
            }
        }
    }

    pub fn encode(self, length: usize) -> CommResult<[u8; 2]> {
        if length > self.max_length() {
            return Err(CommError::MalformedHeader {
                details: format!(
                    "payload length {} exceeds {} for {:?}",
                    length,
                    self.max_length(),
                    self
                ),
            });
        }

        Ok(match self {
            LengthEncoding::BigEndian => (length as u16).to_be_bytes(),
            LengthEncoding::LittleEndian => (length as u16).to_le_bytes(),
            LengthEncoding::Bcd => {
                let digits = [length / 1000, length / 100 % 10, length / 10 % 10, length % 10];
                [
                    ((digits[0] << 4) | digits[1]) as u8,
                    ((digits[2] << 4) | digits[3]) as u8,
                ]
            }
        })
    }
}

/// A complete response frame as received from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    bytes: Vec<u8>,
    payload_len: usize,
}

impl ResponseFrame {
    /// Wrap raw frame bytes, checking that the size matches the declared length
    pub fn from_bytes(bytes: Vec<u8>, encoding: LengthEncoding) -> CommResult<Self> {
        if bytes.len() < RESPONSE_HEADER_LENGTH + RESPONSE_TRAILER_LENGTH {
            return Err(CommError::MalformedHeader {
                details: format!(
                    "frame of {} bytes is shorter than header and trailer",
                    bytes.len()
                ),
            });
        }

        let payload_len = encoding.decode([bytes[1], bytes[2]])?;
        let expected = RESPONSE_HEADER_LENGTH + payload_len + RESPONSE_TRAILER_LENGTH;
        if bytes.len() != expected {
            return Err(CommError::MalformedHeader {
                details: format!(
                    "declared payload of {} bytes needs a {}-byte frame, got {}",
                    payload_len,
                    expected,
                    bytes.len()
                ),
            });
        }

        Ok(Self { bytes, payload_len })
    }

    /// Encode a frame with a correct checksum
    pub fn build(
        control: u8,
        payload: &[u8],
        terminator: u8,
        encoding: LengthEncoding,
    ) -> CommResult<Self> {
        let length = encoding.encode(payload.len())?;

        let mut bytes =
            Vec::with_capacity(RESPONSE_HEADER_LENGTH + payload.len() + RESPONSE_TRAILER_LENGTH);
        bytes.push(control);
        bytes.extend_from_slice(&length);
        bytes.extend_from_slice(payload);
        bytes.push(terminator);
        bytes.push(ChecksumValidator::compute(&bytes[1..]));

        Ok(Self {
            bytes,
            payload_len: payload.len(),
        })
    }

    pub fn control(&self) -> u8 {
        self.bytes[0]
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[RESPONSE_HEADER_LENGTH..RESPONSE_HEADER_LENGTH + self.payload_len]
    }

    pub fn terminator(&self) -> u8 {
        self.bytes[self.bytes.len() - 2]
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Whether the trailing checksum matches the frame contents
    pub fn is_valid(&self) -> bool {
        ChecksumValidator::validate(&self.bytes)
    }
}

/// Reads one length-prefixed response frame from a transport
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameReader {
    encoding: LengthEncoding,
}

impl FrameReader {
    pub fn new(encoding: LengthEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> LengthEncoding {
        self.encoding
    }

    /// Read the fixed header, then the payload and trailer it announces
    ///
    /// Each of the two reads gets the full `timeout`. The checksum is not
    /// checked here.
    pub fn read_frame<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        timeout: Duration,
    ) -> CommResult<ResponseFrame> {
        let header = transport.read(RESPONSE_HEADER_LENGTH, timeout)?;
        if header.len() != RESPONSE_HEADER_LENGTH {
            return Err(CommError::MalformedHeader {
                details: format!("transport returned {} header bytes", header.len()),
            });
        }
        let payload_len = self.encoding.decode([header[1], header[2]])?;
        debug!(
            "Response header: control=0x{:02X}, payload length {}",
            header[0], payload_len
        );

        let rest = transport.read(payload_len + RESPONSE_TRAILER_LENGTH, timeout)?;

        let mut bytes = header;
        bytes.extend_from_slice(&rest);
        trace!("Response frame: {}", hex::encode_upper(&bytes));

        // A transport that hands back fewer bytes than asked must not yield a frame
        ResponseFrame::from_bytes(bytes, self.encoding)
    }
}
