//! modeswitch CLI
//!
//! Handshakes with the switch box, switches the attached device's USB
//! mode and optionally runs auxiliary operations afterwards.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use modeswitch::channel::{Channel, LoopbackDevice};
use modeswitch::session::SessionReport;
use modeswitch::{BatchPolicy, Config, Mode, Operation, RetryPolicy, Session, SwitchError};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// modeswitch
#[derive(Parser, Debug)]
#[command(name = "modeswitch")]
#[command(about = "Switch a device's USB mode through a vendor switch box")]
#[command(version)]
struct Args {
    /// Vendor id of the switch box (hex)
    #[arg(short = 'v', long, default_value = "0403", value_parser = parse_hex_u16)]
    vendor_id: u16,

    /// Product id of the switch box (hex)
    #[arg(short = 'p', long, default_value = "0011", value_parser = parse_hex_u16)]
    product_id: u16,

    /// Mirror all log output to this file
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,

    /// Mode: 0 modem, 1 normal, 2 cass, 3 change-udid, 4 disable-secure-boot,
    /// 5 sec-ctrl-status, 6 flash-frp (number or name)
    #[arg(short = 'm', long, default_value = "modem", value_parser = parse_operation)]
    mode: Operation,

    /// Target device identifier for the targeted modem switch
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Auxiliary operation to run after the mode switch (repeatable)
    #[arg(short = 'r', long = "run", value_parser = parse_operation)]
    run: Vec<Operation>,

    /// Run every auxiliary operation after the mode switch
    #[arg(short = 'a', long, conflicts_with = "run")]
    all: bool,

    /// Keep going after an auxiliary operation fails
    #[arg(short = 'c', long)]
    continue_on_error: bool,

    /// Per-transfer timeout in milliseconds
    #[arg(long, default_value_t = Config::default().timeout_ms)]
    timeout_ms: u64,

    /// Attempts per exchange for transport errors
    #[arg(long, default_value_t = RetryPolicy::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, default_value_t = RetryPolicy::DEFAULT_DELAY.as_millis() as u64)]
    retry_delay_ms: u64,

    /// Talk to an in-process simulated device instead of USB
    #[arg(long)]
    simulate: bool,

    /// Print a JSON session report to stdout
    #[arg(long)]
    json: bool,

    /// Log hex dumps of every frame
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.log_file.as_deref()) {
        eprintln!("Error opening log file: {}", e);
        process::exit(1);
    }

    tracing::info!("modeswitch v{}", modeswitch::VERSION);
    tracing::info!(
        "Vendor ID: 0x{:04x}, Product ID: 0x{:04x}",
        args.vendor_id,
        args.product_id
    );

    let (mode, operations) = match plan(&args) {
        Ok(plan) => plan,
        Err(e) => exit_with(&e),
    };

    // Build config from args
    let mut builder = Config::builder()
        .vendor_id(args.vendor_id)
        .product_id(args.product_id)
        .timeout_ms(args.timeout_ms)
        .retry(RetryPolicy::new(
            args.max_attempts,
            Duration::from_millis(args.retry_delay_ms),
        ))
        .batch_policy(if args.continue_on_error {
            BatchPolicy::ContinueOnError
        } else {
            BatchPolicy::AbortOnError
        });
    if let Some(target) = &args.target {
        builder = builder.target_device(target);
    }
    let config = builder.build();

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let report = if args.simulate {
        tracing::info!("Using simulated device");
        execute(LoopbackDevice::new(), config, mode, &operations)
    } else {
        match open_usb(&config) {
            Ok(channel) => execute(channel, config, mode, &operations),
            Err(e) => exit_with(&e),
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize report: {}", e),
        }
    }

    if report.success {
        tracing::info!("All operations completed successfully");
    } else {
        tracing::error!("Session ended in state {}", report.state);
    }
    process::exit(report.exit_code());
}

/// Work out the mode switch and the auxiliary operations that follow it
///
/// An auxiliary operation given as the mode runs after a modem switch.
fn plan(args: &Args) -> Result<(Mode, Vec<Operation>), SwitchError> {
    let mut operations = Vec::new();

    let mode = match Mode::from_operation(args.mode) {
        Some(mode) => mode,
        None if args.mode.is_auxiliary() => {
            operations.push(args.mode);
            Mode::Modem
        }
        None => {
            return Err(SwitchError::Config(format!(
                "{} cannot be selected as a mode",
                args.mode
            )))
        }
    };

    if args.all {
        operations.extend(Operation::AUXILIARY);
    } else {
        operations.extend(args.run.iter().copied());
    }

    if let Some(op) = operations.iter().find(|op| !op.is_auxiliary()) {
        return Err(SwitchError::Config(format!(
            "{} cannot be run after the mode switch",
            op
        )));
    }

    Ok((mode, operations))
}

/// Drive one session to completion; the channel is released on return
fn execute<C: Channel>(
    channel: C,
    config: Config,
    mode: Mode,
    operations: &[Operation],
) -> SessionReport {
    let mut session = Session::with_tracing(channel, config);

    if session.handshake().is_ok() && session.switch_mode(mode).is_ok() && !operations.is_empty() {
        tracing::info!("Continuing with {} additional operation(s)", operations.len());
        let batch = session.run_batch(operations);
        for skipped in &batch.skipped {
            tracing::warn!("Skipped {}", skipped);
        }
    }

    session.report()
}

#[cfg(feature = "usb")]
fn open_usb(config: &Config) -> Result<Box<dyn Channel>, SwitchError> {
    let channel = modeswitch::channel::UsbChannel::open(config)
        .map_err(SwitchError::ChannelUnavailable)?;
    Ok(Box::new(channel))
}

#[cfg(not(feature = "usb"))]
fn open_usb(_config: &Config) -> Result<Box<dyn Channel>, SwitchError> {
    Err(SwitchError::Config(
        "built without the `usb` feature; use --simulate".to_string(),
    ))
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let default = if verbose {
        "info,modeswitch=trace"
    } else {
        "info,modeswitch=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}

fn exit_with(error: &SwitchError) -> ! {
    tracing::error!("Error: {}", error);
    process::exit(error.exit_code());
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex id '{}': {}", s, e))
}

fn parse_operation(s: &str) -> Result<Operation, String> {
    s.parse::<Operation>().map_err(|e| e.to_string())
}
