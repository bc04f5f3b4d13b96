//! `termination_signal` as the shutdown future of the event-driven driver
//!
//! Kept in its own test binary since it raises a real SIGTERM.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use smpte2022_rs::signal::termination_signal;
use smpte2022_rs::{DriverKind, EventFecGenerator, FecGenerator, GeneratorState, RunConfig};

#[tokio::test]
async fn test_sigterm_ends_run_until() {
    let mut config = RunConfig::default().driver(DriverKind::EventDriven);
    config.media = "127.0.0.1:0".parse().unwrap();
    config.column = "127.0.0.1:9".parse().unwrap();
    config.row = "127.0.0.1:9".parse().unwrap();
    let generator = Arc::new(EventFecGenerator::new(config, FecGenerator::new(5, 6)));

    let run = {
        let generator = Arc::clone(&generator);
        tokio::spawn(async move { generator.run_until(termination_signal()).await })
    };

    while !generator.is_running() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Let the loop reach its first select so the signal listeners exist
    tokio::time::sleep(Duration::from_millis(50)).await;

    let rc = unsafe { libc::raise(libc::SIGTERM) };
    assert_eq!(rc, 0);

    let summary = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.datagrams, 0);
    assert_eq!(generator.state(), GeneratorState::Stopped);
}
