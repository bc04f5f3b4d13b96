//! Receive drivers
//!
//! Two interchangeable ways of running the same relay:
//!
//! - [`SocketFecGenerator`]: blocking receive with a timeout on a dedicated thread
//! - [`EventFecGenerator`]: a tokio event loop dispatching one callback per datagram
//!
//! Both open their sockets the same way ([`socket`]), decode through the same
//! [`MediaPipeline`] and send parity through the same [`FecTransmitter`].
//!
//! ```text
//!   media group ──► recv ──► MediaPipeline ──► FecEngine ──► FecTransmitter
//!                              (decode)        (matrix)       │        │
//!                                                             ▼        ▼
//!                                                        column grp  row grp
//! ```

pub mod event;
pub mod pipeline;
pub mod polling;
pub mod socket;
pub mod transmitter;

pub use event::EventFecGenerator;
pub use pipeline::MediaPipeline;
pub use polling::SocketFecGenerator;
pub use transmitter::FecTransmitter;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::{DriverKind, RunConfig};
use crate::error::{Error, Result};
use crate::fec::FecEngine;
use crate::lifecycle::{GeneratorState, Lifecycle, StopHandle};
use crate::stats::RunSummary;

/// A generator that can be run on a thread of its own
///
/// `run` must claim the lifecycle before doing anything else, so observers
/// waiting for setup to settle are always released.
pub trait Driver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Run until stopped, blocking the calling thread
    fn run(&self) -> Result<RunSummary>;

    fn lifecycle(&self) -> &Lifecycle;

    /// Address the media socket is bound to, once running
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Build the driver selected by `config` and run it in the background
///
/// Returns once setup has finished: setup failures are returned here, and a
/// returned handle refers to a generator that is running (or that already
/// stopped because a stop was requested or its runtime limit elapsed).
pub fn start<E>(config: RunConfig, engine: E) -> Result<GeneratorHandle>
where
    E: FecEngine + 'static,
{
    config.validate()?;

    let driver: Arc<dyn Driver> = match config.driver {
        DriverKind::Polling => Arc::new(SocketFecGenerator::new(config, engine)),
        DriverKind::EventDriven => Arc::new(EventFecGenerator::new(config, engine)),
    };

    GeneratorHandle::spawn(driver)
}

/// Handle to a generator running on its own thread
///
/// Dropping the handle stops the generator and waits for its thread.
pub struct GeneratorHandle {
    driver: Arc<dyn Driver>,
    worker: Option<JoinHandle<Result<RunSummary>>>,
    finished: Option<RunSummary>,
}

impl GeneratorHandle {
    /// Run `driver` on a new thread and wait for its setup to settle
    pub fn spawn(driver: Arc<dyn Driver>) -> Result<Self> {
        let worker = {
            let driver = Arc::clone(&driver);
            std::thread::Builder::new()
                .name(format!("fec-generator-{}", driver.kind()))
                .spawn(move || driver.run())?
        };

        let mut handle = Self {
            driver,
            worker: Some(worker),
            finished: None,
        };

        if handle.driver.lifecycle().wait_settled() == GeneratorState::Stopped {
            handle.finished = Some(handle.join()?);
        }

        Ok(handle)
    }

    /// Request a stop; idempotent
    pub fn stop(&self) -> bool {
        self.stop_handle().stop()
    }

    pub fn is_running(&self) -> bool {
        self.driver.lifecycle().is_running()
    }

    pub fn state(&self) -> GeneratorState {
        self.driver.lifecycle().state()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.driver.local_addr()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.driver.lifecycle().stop_handle()
    }

    pub fn kind(&self) -> DriverKind {
        self.driver.kind()
    }

    /// Wait for the generator to stop and return its run summary
    pub fn wait(mut self) -> Result<RunSummary> {
        match self.finished.take() {
            Some(summary) => Ok(summary),
            None => self.join(),
        }
    }

    fn join(&mut self) -> Result<RunSummary> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| Error::WorkerPanicked)?,
            None => Ok(self.finished.clone().unwrap_or_default()),
        }
    }
}

impl Drop for GeneratorHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stop();
            if worker.join().is_err() {
                tracing::error!("Generator thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorHandle")
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}
