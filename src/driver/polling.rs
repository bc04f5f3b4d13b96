//! Polling driver
//!
//! A dedicated thread blocks on a timed receive. The stop flag and the runtime
//! limit are checked once per iteration, so stop latency is bounded by the
//! receive timeout. Without a timeout the receive blocks indefinitely and a
//! stop request is only observed after the next datagram.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::pipeline::MediaPipeline;
use super::socket;
use super::transmitter::FecTransmitter;
use super::Driver;
use crate::config::{DriverKind, RunConfig};
use crate::error::{LifecycleError, Result};
use crate::fec::FecEngine;
use crate::lifecycle::{GeneratorState, Lifecycle, StopHandle};
use crate::stats::{RunStats, RunSummary};

/// SMPTE 2022-1 FEC generator driven by a blocking socket loop
pub struct SocketFecGenerator<E: FecEngine> {
    config: RunConfig,
    lifecycle: Lifecycle,
    engine: Mutex<Option<E>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl<E: FecEngine> SocketFecGenerator<E> {
    pub fn new(config: RunConfig, engine: E) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(),
            engine: Mutex::new(Some(engine)),
            local_addr: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> GeneratorState {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.lifecycle.stop_handle()
    }

    /// Ask the receive loop to stop at its next iteration
    pub fn stop(&self) -> bool {
        self.lifecycle.stop_handle().stop()
    }

    /// Address the media socket is bound to, once running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Run the generator until stopped
    ///
    /// Fails with `AlreadyRunning` if a run is in progress and with
    /// `Terminated` if this generator already ran.
    pub fn run(&self) -> Result<RunSummary> {
        let guard = self.lifecycle.begin()?;
        self.config.validate()?;
        let mut engine = self
            .engine
            .lock()
            .take()
            .ok_or(LifecycleError::Terminated)?;

        let span = tracing::info_span!("fec_generator", driver = "polling", media = %self.config.media);
        let _enter = span.enter();

        tracing::info!(
            l = self.config.l,
            d = self.config.d,
            column = %self.config.column,
            row = %self.config.row,
            "SMPTE 2022-1 FEC generator starting"
        );

        let media_socket =
            socket::open_polling_socket(self.config.media, self.config.effective_timeout())?;
        let send_socket = socket::open_send_socket(self.config.column, self.config.fec_ttl, false)?;
        *self.local_addr.lock() = media_socket.local_addr().ok();

        let stats = Arc::new(RunStats::new());
        engine.register_handler(Box::new(FecTransmitter::new(
            send_socket,
            self.config.column,
            self.config.row,
            Arc::clone(&stats),
        )));
        let mut pipeline =
            MediaPipeline::new(engine, Arc::clone(&stats), self.config.recv_buffer_size);

        guard.running();
        tracing::info!(addr = ?self.local_addr(), "Started listening");

        let started = Instant::now();
        let result = self.receive_loop(&media_socket, &mut pipeline, started);
        drop(media_socket);

        let summary = stats.summary(started.elapsed());
        match result {
            Ok(()) => {
                summary.log();
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Receive loop failed");
                Err(e)
            }
        }
    }

    fn receive_loop(
        &self,
        socket: &UdpSocket,
        pipeline: &mut MediaPipeline<E>,
        started: Instant,
    ) -> Result<()> {
        let mut buf = pipeline.receive_buffer();

        while !self.lifecycle.stop_requested() {
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => pipeline.datagram_received(&buf[..n], from),
                // Time-out or transient error: nothing more than re-looping
                Err(e) if socket::is_transient(&e) => {}
                Err(e) => return Err(e.into()),
            }

            if let Some(limit) = self.config.max_runtime {
                if started.elapsed() > limit {
                    tracing::info!(limit_secs = limit.as_secs_f64(), "Runtime limit reached");
                    break;
                }
            }
        }

        Ok(())
    }
}

impl<E: FecEngine> Driver for SocketFecGenerator<E> {
    fn kind(&self) -> DriverKind {
        DriverKind::Polling
    }

    fn run(&self) -> Result<RunSummary> {
        SocketFecGenerator::run(self)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        SocketFecGenerator::local_addr(self)
    }
}

impl<E: FecEngine> std::fmt::Debug for SocketFecGenerator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketFecGenerator")
            .field("media", &self.config.media)
            .field("state", &self.state())
            .finish()
    }
}
