//! SMPTE 2022-1 FEC generator
//!
//! Run with: cargo run --example fec_generator [DRIVER] [TIMEOUT_SECS] [STOP_SECS]
//!
//! Examples:
//!   cargo run --example fec_generator                  # polling driver, 1s timeout, runs until Ctrl+C
//!   cargo run --example fec_generator event            # event-driven driver
//!   cargo run --example fec_generator polling 1 60     # 1s receive timeout, stop after 60s
//!
//! Media is read from 239.232.0.222:5004, column parity is sent to
//! 232.232.0.222:5006 and row parity to 232.232.0.222:5008 (L = 5, D = 6).
//!
//! ## Feeding a test stream
//!
//! With ffmpeg:
//!   ffmpeg -re -i input.ts -c copy -f rtp_mpegts rtp://239.232.0.222:5004
//!
//! ## Watching the parity streams
//!
//! With tcpdump:
//!   tcpdump -n udp and dst 232.232.0.222

use std::time::Duration;

use smpte2022_rs::signal::install_termination_handler;
use smpte2022_rs::{driver, DriverKind, Error, FecGenerator, RunConfig};

/// Receive timeout when none is given; bounds how long Ctrl+C takes to stop the run
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

fn parse_secs(arg: &str, what: &str) -> Result<Duration, String> {
    match arg.parse::<f64>() {
        Ok(secs) if secs > 0.0 && secs.is_finite() => Ok(Duration::from_secs_f64(secs)),
        _ => Err(format!(
            "Invalid {}: '{}'. Expected a positive number of seconds",
            what, arg
        )),
    }
}

fn print_usage() {
    eprintln!("Usage: fec_generator [DRIVER] [TIMEOUT_SECS] [STOP_SECS]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  DRIVER        'polling' or 'event' (default: polling)");
    eprintln!("  TIMEOUT_SECS  Receive timeout, bounds how long Ctrl+C takes (default: 1)");
    eprintln!("  STOP_SECS     Stop after this many seconds (default: run until Ctrl+C)");
}

fn parse_args(args: &[String]) -> Result<RunConfig, String> {
    let mut config = RunConfig::default();

    if let Some(kind) = args.get(1) {
        let kind: DriverKind = kind.parse().map_err(|e| format!("{}", e))?;
        config = config.driver(kind);
    }
    let timeout = match args.get(2) {
        Some(timeout) => parse_secs(timeout, "timeout")?,
        None => DEFAULT_TIMEOUT,
    };
    config = config.receive_timeout(timeout);
    if let Some(stop) = args.get(3) {
        config = config.stop_after(parse_secs(stop, "stop time")?);
    }

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smpte2022_rs=info".parse()?)
                .add_directive("fec_generator=info".parse()?),
        )
        .init();

    println!(
        "Starting SMPTE 2022-1 FEC generator ({} driver, L={} D={})",
        config.driver, config.l, config.d
    );
    println!("  media:  {}", config.media);
    println!("  column: {}", config.column);
    println!("  row:    {}", config.row);
    println!();

    let engine = FecGenerator::new(config.l, config.d);
    let handle = match driver::start(config, engine) {
        Ok(handle) => handle,
        Err(e @ Error::Setup(_)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    install_termination_handler(handle.stop_handle())?;
    tracing::info!(addr = ?handle.local_addr(), "Running, press Ctrl+C to stop");

    let summary = handle.wait()?;
    println!();
    println!(
        "Stopped after {:.1}s: {} media packets ({:.1} pkt/s), {} invalid, {} columns, {} rows, {} resets",
        summary.duration.as_secs_f64(),
        summary.forwarded,
        summary.packet_rate(),
        summary.invalid,
        summary.columns_sent,
        summary.rows_sent,
        summary.resets,
    );

    Ok(())
}
