//! Command transaction state machine
//!
//! A transaction runs in two phases, each with its own retry budget:
//!
//! 1. Handshake: write the command and wait for a single ACK byte. A NACK,
//!    any other byte or a timeout re-sends the whole command.
//! 2. Response: read one frame, check its LRC and answer ACK or NACK. A NACK
//!    asks the terminal to resend, so the next attempt reads a fresh frame. A
//!    frame that cannot be read at all ends the transaction.
//!
//! Protocol failures are reported as a failed outcome. Only transport faults
//! (device gone, port unusable) come back as `Err`.

use crate::core::constants::{ACK, NACK, RESPONSE_ACK_LENGTH};
use crate::core::types::{AckByte, TransactionOutcome, TransactionReport};
use crate::hardware::{CommError, CommResult, Transport};
use crate::processing::checksum::ChecksumValidator;
use crate::processing::frame::{FrameReader, ResponseFrame};
use crate::utils::config::ProtocolSettings;
use log::{debug, error, info, warn};

/// Drives one command/response exchange at a time over a borrowed transport
pub struct CommandTransactionController<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    settings: ProtocolSettings,
    reader: FrameReader,
}

impl<'a, T: Transport + ?Sized> CommandTransactionController<'a, T> {
    /// Controller with the standard retry budget and timeouts
    pub fn new(transport: &'a mut T) -> Self {
        Self::with_settings(transport, ProtocolSettings::default())
    }

    pub fn with_settings(transport: &'a mut T, settings: ProtocolSettings) -> Self {
        Self {
            transport,
            settings,
            reader: FrameReader::new(settings.length_encoding),
        }
    }

    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &*self.transport
    }

    /// Run a full transaction, reporting only success or failure
    ///
    /// `Ok(false)` covers every protocol failure. `Err` means the transport
    /// itself failed and should be reopened.
    pub fn execute_command(&mut self, command: &[u8]) -> CommResult<bool> {
        Ok(self.execute(command)?.is_success())
    }

    /// Run a full transaction and return what happened
    pub fn execute(&mut self, command: &[u8]) -> CommResult<TransactionReport> {
        debug!("Executing command: {}", hex::encode_upper(command));

        let (acknowledged, handshake_attempts) = self.handshake(command)?;
        if !acknowledged {
            warn!(
                "No ACK after {} attempts, transaction aborted",
                handshake_attempts
            );
            return Ok(TransactionReport::handshake_failed(handshake_attempts));
        }

        let (response, response_attempts) = self.receive_response()?;
        let outcome = if response.is_some() {
            TransactionOutcome::Success
        } else {
            TransactionOutcome::ResponseFailed
        };
        info!(
            "Transaction {:?} (handshake attempts: {}, response attempts: {})",
            outcome, handshake_attempts, response_attempts
        );

        Ok(TransactionReport {
            outcome,
            handshake_attempts,
            response_attempts,
            response,
        })
    }

    /// Phase 1: returns whether an ACK arrived and how many writes it took
    fn handshake(&mut self, command: &[u8]) -> CommResult<(bool, u8)> {
        let mut attempts = 0;

        while attempts < self.settings.max_retry {
            attempts += 1;
            debug!("Handshake attempt {}/{}", attempts, self.settings.max_retry);

            if let Err(err) = self.transport.write(command) {
                absorb(err, "command write")?;
                continue;
            }

            match self
                .transport
                .read(RESPONSE_ACK_LENGTH, self.settings.ack_timeout())
            {
                Ok(reply) => match reply.first().map(|&b| AckByte::from_byte(b)) {
                    Some(AckByte::Ack) => return Ok((true, attempts)),
                    Some(other) => warn!("Handshake attempt {}: received {}", attempts, other),
                    None => warn!("Handshake attempt {}: empty reply", attempts),
                },
                Err(err) => absorb(err, "handshake read")?,
            }
        }

        Ok((false, attempts))
    }

    /// Phase 2: returns the accepted frame, if any, and the number of frames requested
    fn receive_response(&mut self) -> CommResult<(Option<ResponseFrame>, u8)> {
        let mut attempts = 0;

        while attempts < self.settings.max_retry {
            attempts += 1;
            debug!("Response attempt {}/{}", attempts, self.settings.max_retry);

            let frame = match self
                .reader
                .read_frame(&mut *self.transport, self.settings.data_timeout())
            {
                Ok(frame) => frame,
                Err(err) => {
                    absorb(err, "response read")?;
                    return Ok((None, attempts));
                }
            };

            if frame.is_valid() {
                if !self.send_control(ACK)? {
                    return Ok((None, attempts));
                }
                return Ok((Some(frame), attempts));
            }

            warn!(
                "Checksum mismatch on attempt {}: expected 0x{:02X}, received 0x{:02X}",
                attempts,
                ChecksumValidator::covered_range(frame.as_bytes())
                    .map(ChecksumValidator::compute)
                    .unwrap_or(0),
                frame.checksum()
            );
            if !self.send_control(NACK)? {
                return Ok((None, attempts));
            }
        }

        Ok((None, attempts))
    }

    /// Write a single ACK/NACK byte; `Ok(false)` if the write failed recoverably
    fn send_control(&mut self, byte: u8) -> CommResult<bool> {
        debug!("Sending {}", AckByte::from_byte(byte));
        match self.transport.write(&[byte]) {
            Ok(()) => Ok(true),
            Err(err) => {
                absorb(err, "acknowledgment write")?;
                Ok(false)
            }
        }
    }
}

/// Swallow protocol-level errors, propagate transport faults
fn absorb(err: CommError, context: &str) -> CommResult<()> {
    if err.is_transport_fault() {
        error!("Transport fault during {}: {}", context, err);
        return Err(err);
    }
    warn!("{} failed: {}", context, err);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{ACK_TIMEOUT_MS, DATA_TIMEOUT_MS, MAX_RETRY};
    use crate::hardware::MockTransport;
    use crate::processing::frame::LengthEncoding;
    use std::io;
    use std::time::Duration;

    const COMMAND: &[u8] = &[0x02, 0x00, 0x04, 0x31, 0x32, 0x33, 0x34, 0x03, 0x00];

    fn valid_frame() -> ResponseFrame {
        ResponseFrame::build(0x02, b"APPROVED", 0x03, LengthEncoding::BigEndian).unwrap()
    }

    fn corrupted_frame() -> Vec<u8> {
        let mut bytes = valid_frame().into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x5A;
        bytes
    }

    fn ack_timeout() -> Duration {
        Duration::from_millis(ACK_TIMEOUT_MS)
    }

    fn data_timeout() -> Duration {
        Duration::from_millis(DATA_TIMEOUT_MS)
    }

    #[test]
    fn test_success_after_single_handshake() {
        let mut transport = MockTransport::new();
        transport.queue_ack().queue_frame(&valid_frame());

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::Success);
        assert_eq!(report.handshake_attempts, 1);
        assert_eq!(report.response_attempts, 1);
        assert_eq!(report.response.unwrap().payload(), b"APPROVED");
        assert_eq!(
            transport.get_sent_messages(),
            &[COMMAND.to_vec(), vec![ACK]]
        );
        assert_eq!(transport.read_requests()[0], (1, ack_timeout()));
        assert_eq!(transport.read_requests()[1], (3, data_timeout()));
        assert_eq!(transport.read_requests()[2], (8 + 2, data_timeout()));
        assert_eq!(transport.pending_replies(), 0);
    }

    #[test]
    fn test_two_nacks_then_ack() {
        let mut transport = MockTransport::new();
        transport
            .queue_nack()
            .queue_nack()
            .queue_ack()
            .queue_frame(&valid_frame());

        let success = CommandTransactionController::new(&mut transport)
            .execute_command(COMMAND)
            .unwrap();

        assert!(success);
        assert_eq!(transport.count_sent(COMMAND), 3);
        assert_eq!(transport.count_sent(&[ACK]), 1);
        // Every command write discards stale input first
        assert!(transport.discard_count() >= 3);
    }

    #[test]
    fn test_timeout_and_garbage_are_treated_like_nack() {
        let mut transport = MockTransport::new();
        transport
            .queue_timeout()
            .queue_bytes(vec![0x42])
            .queue_ack()
            .queue_frame(&valid_frame());

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.handshake_attempts, 3);
        assert_eq!(transport.count_sent(COMMAND), 3);
    }

    #[test]
    fn test_handshake_exhaustion_skips_response_phase() {
        let mut transport = MockTransport::new();
        transport.queue_nack().queue_timeout().queue_nack();

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::HandshakeFailed);
        assert_eq!(report.handshake_attempts, MAX_RETRY);
        assert_eq!(report.response_attempts, 0);
        assert_eq!(transport.get_sent_messages().len(), MAX_RETRY as usize);
        assert_eq!(transport.count_sent(COMMAND), MAX_RETRY as usize);
        assert_eq!(transport.read_requests().len(), MAX_RETRY as usize);
        assert!(transport
            .read_requests()
            .iter()
            .all(|&(count, timeout)| count == 1 && timeout == ack_timeout()));
    }

    #[test]
    fn test_silent_peer_returns_false() {
        let mut transport = MockTransport::new();

        let success = CommandTransactionController::new(&mut transport)
            .execute_command(COMMAND)
            .unwrap();

        assert!(!success);
        assert_eq!(transport.count_sent(COMMAND), MAX_RETRY as usize);
    }

    #[test]
    fn test_bad_checksum_then_valid_frame() {
        let mut transport = MockTransport::new();
        transport
            .queue_ack()
            .queue_bytes(corrupted_frame())
            .queue_frame(&valid_frame());

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.response_attempts, 2);
        assert_eq!(transport.count_sent(&[NACK]), 1);
        assert_eq!(transport.count_sent(&[ACK]), 1);
        assert_eq!(
            &transport.get_sent_messages()[1..],
            &[vec![NACK], vec![ACK]]
        );
    }

    #[test]
    fn test_checksum_failures_exhaust_budget() {
        let mut transport = MockTransport::new();
        transport.queue_ack();
        for _ in 0..MAX_RETRY {
            transport.queue_bytes(corrupted_frame());
        }

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
        assert_eq!(report.response_attempts, MAX_RETRY);
        assert!(report.response.is_none());
        assert_eq!(transport.count_sent(&[NACK]), MAX_RETRY as usize);
        assert_eq!(transport.count_sent(&[ACK]), 0);
    }

    #[test]
    fn test_header_timeout_ends_transaction() {
        let mut transport = MockTransport::new();
        transport.queue_ack().queue_timeout().queue_frame(&valid_frame());

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
        assert_eq!(report.response_attempts, 1);
        // One handshake read and a single header read, nothing more
        assert_eq!(transport.read_requests().len(), 2);
        assert_eq!(transport.read_requests()[1], (3, data_timeout()));
        assert_eq!(transport.get_sent_messages().len(), 1);
    }

    #[test]
    fn test_truncated_body_ends_transaction() {
        let mut transport = MockTransport::new();
        transport.queue_ack().queue_bytes(vec![0x02, 0x00, 0x08, 0x41]);

        let success = CommandTransactionController::new(&mut transport)
            .execute_command(COMMAND)
            .unwrap();

        assert!(!success);
        assert_eq!(transport.read_requests().len(), 3);
        assert_eq!(transport.count_sent(&[NACK]), 0);
    }

    #[test]
    fn test_recoverable_read_error_is_absorbed() {
        let mut transport = MockTransport::new();
        transport
            .queue_io_error(io::ErrorKind::InvalidData, "framing error")
            .queue_ack()
            .queue_io_error(io::ErrorKind::InvalidData, "parity error");

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.handshake_attempts, 2);
        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
    }

    #[test]
    fn test_transport_fault_propagates_from_handshake() {
        let mut transport = MockTransport::new();
        transport.queue_nack().queue_fault("device removed");

        let result = CommandTransactionController::new(&mut transport).execute_command(COMMAND);

        assert!(matches!(result, Err(CommError::Disconnected { .. })));
        // Not retried after the fault
        assert_eq!(transport.count_sent(COMMAND), 2);
    }

    #[test]
    fn test_transport_fault_propagates_from_response() {
        let mut transport = MockTransport::new();
        transport.queue_ack().queue_fault("device removed");

        let result = CommandTransactionController::new(&mut transport).execute(COMMAND);
        assert!(result.unwrap_err().is_transport_fault());
    }

    #[test]
    fn test_write_fault_propagates() {
        let mut transport = MockTransport::new();
        transport.disconnect();

        let result = CommandTransactionController::new(&mut transport).execute_command(COMMAND);
        assert!(matches!(result, Err(CommError::Disconnected { .. })));
        assert!(transport.get_sent_messages().is_empty());
    }

    #[test]
    fn test_failed_ack_write_ends_transaction() {
        let mut transport = MockTransport::new();
        transport
            .queue_write_ok()
            .queue_write_error(io::ErrorKind::Other, "transmit overrun");
        transport.queue_ack().queue_frame(&valid_frame());

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
        assert_eq!(report.response_attempts, 1);
        assert!(report.response.is_none());
        // No further frame is requested after the lost ACK
        assert_eq!(transport.read_requests().len(), 3);
        assert_eq!(transport.get_sent_messages(), &[COMMAND.to_vec()]);
    }

    #[test]
    fn test_failed_nack_write_ends_transaction() {
        let mut transport = MockTransport::new();
        transport
            .queue_write_ok()
            .queue_write_error(io::ErrorKind::Other, "transmit overrun");
        transport
            .queue_ack()
            .queue_bytes(corrupted_frame())
            .queue_frame(&valid_frame());

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
        assert_eq!(report.response_attempts, 1);
        assert_eq!(transport.read_requests().len(), 3);
    }

    #[test]
    fn test_ack_write_fault_propagates() {
        let mut transport = MockTransport::new();
        transport
            .queue_write_ok()
            .queue_write_fault("device removed");
        transport.queue_ack().queue_frame(&valid_frame());

        let result = CommandTransactionController::new(&mut transport).execute(COMMAND);

        assert!(matches!(result, Err(CommError::Disconnected { .. })));
        assert_eq!(transport.count_sent(&[ACK]), 0);
    }

    #[test]
    fn test_empty_command_is_sent_as_is() {
        let mut transport = MockTransport::new();
        transport.queue_ack().queue_frame(&valid_frame());

        let success = CommandTransactionController::new(&mut transport)
            .execute_command(&[])
            .unwrap();

        assert!(success);
        assert_eq!(transport.count_sent(&[]), 1);
        assert!(transport.get_sent_messages()[0].is_empty());
        assert_eq!(transport.get_sent_messages().len(), 2);
    }

    #[test]
    fn test_short_body_from_transport_ends_transaction() {
        struct ShortBodyTransport {
            reads: Vec<Vec<u8>>,
            sent: Vec<Vec<u8>>,
        }

        impl Transport for ShortBodyTransport {
            fn write(&mut self, bytes: &[u8]) -> CommResult<()> {
                self.sent.push(bytes.to_vec());
                Ok(())
            }

            fn read(&mut self, _count: usize, _timeout: Duration) -> CommResult<Vec<u8>> {
                if self.reads.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(self.reads.remove(0))
            }
        }

        // The lone body byte equals the XOR of [00 05]
        let mut transport = ShortBodyTransport {
            reads: vec![vec![ACK], vec![0x02, 0x00, 0x05], vec![0x05]],
            sent: Vec::new(),
        };

        let report = CommandTransactionController::new(&mut transport)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
        assert!(report.response.is_none());
        assert_eq!(transport.sent, vec![COMMAND.to_vec()]);
    }

    #[test]
    fn test_malformed_bcd_header_ends_transaction() {
        let settings = ProtocolSettings {
            length_encoding: LengthEncoding::Bcd,
            ..ProtocolSettings::default()
        };
        let mut transport = MockTransport::new();
        transport.queue_ack().queue_bytes(vec![0x02, 0x0A, 0x00]);

        let report = CommandTransactionController::with_settings(&mut transport, settings)
            .execute(COMMAND)
            .unwrap();

        assert_eq!(report.outcome, TransactionOutcome::ResponseFailed);
        assert_eq!(transport.read_requests().len(), 2);
    }

    #[test]
    fn test_custom_settings() {
        let settings = ProtocolSettings {
            max_retry: 5,
            ack_timeout_ms: 50,
            data_timeout_ms: 400,
            length_encoding: LengthEncoding::Bcd,
        };
        let frame = ResponseFrame::build(0x02, &[0u8; 12], 0x03, LengthEncoding::Bcd).unwrap();
        let mut transport = MockTransport::new();
        for _ in 0..4 {
            transport.queue_nack();
        }
        transport.queue_ack().queue_frame(&frame);

        let report = CommandTransactionController::with_settings(&mut transport, settings)
            .execute(COMMAND)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.handshake_attempts, 5);
        assert_eq!(transport.read_requests()[0], (1, Duration::from_millis(50)));
        assert_eq!(transport.read_requests()[5], (3, Duration::from_millis(400)));
        assert_eq!(transport.read_requests()[6], (14, Duration::from_millis(400)));
    }

    #[test]
    fn test_sequential_transactions_share_no_state() {
        let mut transport = MockTransport::new();
        transport.queue_nack().queue_nack().queue_nack();
        transport.queue_ack().queue_frame(&valid_frame());

        let mut controller = CommandTransactionController::new(&mut transport);
        assert!(!controller.execute_command(COMMAND).unwrap());
        assert!(controller.execute_command(COMMAND).unwrap());
        assert_eq!(controller.transport().count_sent(COMMAND), 4);
    }
}
