//! Termination signals
//!
//! Interrupt and terminate requests are turned into a generator stop, so the
//! receive loop exits at its next boundary and releases its socket instead of
//! the process dying mid-packet.

use crate::error::{Error, Result};
use crate::lifecycle::StopHandle;

/// Stop the generator behind `handle` on SIGINT or SIGTERM
///
/// Only one handler can be installed per process.
pub fn install_termination_handler(handle: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        if !handle.stop() {
            tracing::debug!("Termination signal received while already stopping");
        }
    })
    .map_err(|e| Error::Signal(e.to_string()))
}

/// Resolve when the process receives an interrupt or terminate request
///
/// For use as the shutdown future of [`EventFecGenerator::run_until`].
///
/// [`EventFecGenerator::run_until`]: crate::driver::EventFecGenerator::run_until
pub async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Termination signal received");
}
