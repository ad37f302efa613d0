use nets_comm::{CommandTransactionController, LinkConfig, SerialTransport, TransactionOutcome};
use std::process::ExitCode;

const EXIT_PROTOCOL_FAILURE: u8 = 1;
const EXIT_FAULT: u8 = 2;

fn init_logging(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    env_logger::Builder::from_env(env).init();
}

fn usage(program: &str) {
    eprintln!("Usage: {} <config.json> <hex_command>", program);
    eprintln!("   or: {} --write-default-config <config.json>", program);
    eprintln!("   or: {} --list-ports", program);
}

fn list_ports() -> ExitCode {
    match SerialTransport::available_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("No serial ports found");
            ExitCode::SUCCESS
        }
        Ok(ports) => {
            for port in ports {
                println!("{}", port);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to enumerate ports: {}", e);
            ExitCode::from(EXIT_FAULT)
        }
    }
}

fn write_default_config(path: &str) -> ExitCode {
    match LinkConfig::default().save_to_file(path) {
        Ok(()) => {
            println!("Wrote default configuration to {}", path);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(EXIT_FAULT)
        }
    }
}

fn run_command(config_path: &str, hex_command: &str) -> ExitCode {
    let config = match LinkConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FAULT);
        }
    };
    init_logging(&config.log_level);

    let command = match hex::decode(hex_command.replace([' ', '-', ':'], "")) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Invalid hex command '{}': {}", hex_command, e);
            return ExitCode::from(EXIT_FAULT);
        }
    };

    // The port stays open for the lifetime of `transport` and closes on drop
    let mut transport = match SerialTransport::open(&config.serial) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FAULT);
        }
    };

    let mut controller =
        CommandTransactionController::with_settings(&mut transport, config.protocol);
    match controller.execute(&command) {
        Ok(report) => match report.outcome {
            TransactionOutcome::Success => {
                if let Some(frame) = report.response {
                    println!("{}", hex::encode_upper(frame.payload()));
                }
                ExitCode::SUCCESS
            }
            TransactionOutcome::HandshakeFailed => {
                eprintln!(
                    "Terminal did not acknowledge the command after {} attempts",
                    report.handshake_attempts
                );
                ExitCode::from(EXIT_PROTOCOL_FAILURE)
            }
            TransactionOutcome::ResponseFailed => {
                eprintln!(
                    "No valid response after {} attempts",
                    report.response_attempts
                );
                ExitCode::from(EXIT_PROTOCOL_FAILURE)
            }
        },
        Err(e) => {
            eprintln!("Transport fault: {}", e);
            ExitCode::from(EXIT_FAULT)
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("nets-comm", |s| s.as_str());

    if args.len() == 2 && args[1] == "--list-ports" {
        return list_ports();
    }

    if args.len() == 3 && args[1] == "--write-default-config" {
        return write_default_config(&args[2]);
    }

    if args.len() != 3 {
        usage(program);
        return ExitCode::from(EXIT_FAULT);
    }

    run_command(&args[1], &args[2])
}
