//! Transaction engine demonstration
//!
//! Runs the command/response engine against a scripted mock terminal so the
//! retry behavior can be observed without hardware. Set `RUST_LOG=debug` to
//! see every attempt.

use nets_comm::{
    CommError, CommandTransactionController, LengthEncoding, MockTransport, ResponseFrame,
};

const COMMAND: &[u8] = &[0x02, 0x00, 0x02, 0x31, 0x30, 0x03, 0x01];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Payment Terminal Link - Mock Transaction Demo ===\n");

    demo_clean_exchange()?;
    demo_lossy_link()?;
    demo_unresponsive_terminal()?;
    demo_unplugged_terminal();

    println!("\nMock transaction demo completed successfully!");
    Ok(())
}

fn approved_frame() -> Result<ResponseFrame, CommError> {
    ResponseFrame::build(0x02, b"00APPROVED", 0x03, LengthEncoding::BigEndian)
}

fn demo_clean_exchange() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Clean exchange ---");

    let mut terminal = MockTransport::new();
    terminal.queue_ack().queue_frame(&approved_frame()?);

    let report = CommandTransactionController::new(&mut terminal).execute(COMMAND)?;
    println!("Outcome: {:?}", report.outcome);
    if let Some(frame) = &report.response {
        println!("Payload: {}", String::from_utf8_lossy(frame.payload()));
    }
    println!("Bytes written: {:?}\n", terminal.get_sent_messages());
    Ok(())
}

fn demo_lossy_link() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Lossy link (NACK, timeout, corrupted frame) ---");

    let mut corrupted = approved_frame()?.into_bytes();
    corrupted[5] ^= 0x01;

    let mut terminal = MockTransport::new();
    terminal
        .queue_nack()
        .queue_timeout()
        .queue_ack()
        .queue_bytes(corrupted)
        .queue_frame(&approved_frame()?);

    let report = CommandTransactionController::new(&mut terminal).execute(COMMAND)?;
    println!(
        "Outcome: {:?} after {} handshake and {} response attempts\n",
        report.outcome, report.handshake_attempts, report.response_attempts
    );
    Ok(())
}

fn demo_unresponsive_terminal() -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Unresponsive terminal ---");

    let mut terminal = MockTransport::new();
    let success = CommandTransactionController::new(&mut terminal).execute_command(COMMAND)?;
    println!(
        "Success: {} (command sent {} times)\n",
        success,
        terminal.count_sent(COMMAND)
    );
    Ok(())
}

fn demo_unplugged_terminal() {
    println!("--- Unplugged terminal ---");

    let mut terminal = MockTransport::new();
    terminal.queue_fault("USB device removed");

    match CommandTransactionController::new(&mut terminal).execute_command(COMMAND) {
        Ok(success) => println!("Unexpected result: {}", success),
        Err(e) => println!(
            "Transport fault: {} (recovery: {:?})",
            e,
            e.recovery_strategy()
        ),
    }
}
