//! Mock transport for testing and development

use crate::core::constants::{ACK, NACK};
use crate::hardware::{CommError, CommResult, Transport};
use crate::processing::frame::ResponseFrame;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Bytes(Vec<u8>),
    Timeout,
    Error(CommError),
}

/// Scripted transport that plays back queued replies
///
/// Each `read` consumes queued byte chunks until the requested count is
/// reached. Running into a queued timeout, an empty queue or a short chunk
/// yields [`CommError::Timeout`]; a queued error is returned as-is. Input
/// discards performed by `write` are counted but do not drop scripted
/// replies.
///
/// Writes succeed unless a write result has been queued. Each `write` pops
/// one queued result; a failed write is not recorded as sent.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: VecDeque<Reply>,
    write_results: VecDeque<Option<CommError>>,
    sent_messages: Vec<Vec<u8>>,
    read_requests: Vec<(usize, Duration)>,
    discard_count: usize,
    disconnected: bool,
}

impl MockTransport {
    /// Create a mock with nothing queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for the peer to "send"
    pub fn queue_bytes(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.replies.push_back(Reply::Bytes(data.into()));
        self
    }

    pub fn queue_ack(&mut self) -> &mut Self {
        self.queue_bytes(vec![ACK])
    }

    pub fn queue_nack(&mut self) -> &mut Self {
        self.queue_bytes(vec![NACK])
    }

    /// Queue a complete response frame
    pub fn queue_frame(&mut self, frame: &ResponseFrame) -> &mut Self {
        self.queue_bytes(frame.as_bytes().to_vec())
    }

    /// The next read that reaches this point times out
    pub fn queue_timeout(&mut self) -> &mut Self {
        self.replies.push_back(Reply::Timeout);
        self
    }

    /// The next read that reaches this point fails with a device fault
    pub fn queue_fault(&mut self, details: &str) -> &mut Self {
        self.replies.push_back(Reply::Error(CommError::Disconnected {
            details: details.to_string(),
        }));
        self
    }

    /// The next read that reaches this point fails with a recoverable I/O error
    pub fn queue_io_error(&mut self, kind: io::ErrorKind, message: &str) -> &mut Self {
        self.replies.push_back(Reply::Error(CommError::Io {
            kind,
            message: message.to_string(),
        }));
        self
    }

    /// The next scripted write succeeds
    pub fn queue_write_ok(&mut self) -> &mut Self {
        self.write_results.push_back(None);
        self
    }

    /// The next scripted write fails with a recoverable I/O error
    pub fn queue_write_error(&mut self, kind: io::ErrorKind, message: &str) -> &mut Self {
        self.write_results.push_back(Some(CommError::Io {
            kind,
            message: message.to_string(),
        }));
        self
    }

    /// The next scripted write fails with a device fault
    pub fn queue_write_fault(&mut self, details: &str) -> &mut Self {
        self.write_results.push_back(Some(CommError::Disconnected {
            details: details.to_string(),
        }));
        self
    }

    /// Simulate the device being unplugged
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    /// Restore connection
    pub fn reconnect(&mut self) {
        self.disconnected = false;
    }

    /// Every buffer written, in order
    pub fn get_sent_messages(&self) -> &[Vec<u8>] {
        &self.sent_messages
    }

    /// Number of writes that carried exactly `bytes`
    pub fn count_sent(&self, bytes: &[u8]) -> usize {
        self.sent_messages.iter().filter(|m| m.as_slice() == bytes).count()
    }

    /// Every read request as `(count, timeout)`, in order
    pub fn read_requests(&self) -> &[(usize, Duration)] {
        &self.read_requests
    }

    /// Number of times buffered input/output was discarded
    pub fn discard_count(&self) -> usize {
        self.discard_count
    }

    /// Number of scripted replies not yet consumed
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    fn disconnected_error(&self) -> CommError {
        CommError::Disconnected {
            details: "mock transport disconnected".to_string(),
        }
    }
}

impl Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> CommResult<()> {
        if self.disconnected {
            return Err(self.disconnected_error());
        }
        if let Some(Some(err)) = self.write_results.pop_front() {
            return Err(err);
        }

        self.discard_count += 1;
        self.sent_messages.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, count: usize, timeout: Duration) -> CommResult<Vec<u8>> {
        self.read_requests.push((count, timeout));
        if self.disconnected {
            return Err(self.disconnected_error());
        }

        let mut data = Vec::with_capacity(count);
        while data.len() < count {
            match self.replies.pop_front() {
                Some(Reply::Bytes(mut chunk)) => {
                    let needed = count - data.len();
                    if chunk.len() > needed {
                        let rest = chunk.split_off(needed);
                        self.replies.push_front(Reply::Bytes(rest));
                    }
                    data.extend_from_slice(&chunk);
                }
                Some(Reply::Error(err)) => return Err(err),
                Some(Reply::Timeout) | None => {
                    return Err(CommError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                        expected: count,
                        received: data.len(),
                    });
                }
            }
        }

        Ok(data)
    }
}
