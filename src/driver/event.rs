//! Event-driven driver
//!
//! One cooperative loop dispatches a callback per inbound datagram. The only
//! suspension point is the receive; decoding, the engine and parity sends all
//! run synchronously inside the callback, so none of them may block. The send
//! socket is non-blocking: a packet the kernel cannot take immediately is
//! dropped and counted as a send failure.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::Instrument;

use super::pipeline::MediaPipeline;
use super::socket;
use super::transmitter::FecTransmitter;
use super::Driver;
use crate::config::{DriverKind, RunConfig};
use crate::error::{LifecycleError, Result, SetupError, SetupStep};
use crate::fec::FecEngine;
use crate::lifecycle::{GeneratorState, Lifecycle, RunGuard, StopHandle};
use crate::stats::{RunStats, RunSummary};

/// SMPTE 2022-1 FEC generator driven by a tokio event loop
pub struct EventFecGenerator<E: FecEngine> {
    config: RunConfig,
    lifecycle: Lifecycle,
    engine: Mutex<Option<E>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl<E: FecEngine> EventFecGenerator<E> {
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

    pub fn stop(&self) -> bool {
        self.lifecycle.stop_handle().stop()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Run on the caller's runtime until `shutdown` resolves, a stop is
    /// requested or the runtime limit elapses
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let guard = self.lifecycle.begin()?;
        self.serve(guard, shutdown).await
    }

    async fn serve<F>(&self, guard: RunGuard, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let span = tracing::info_span!("fec_generator", driver = "event", media = %self.config.media);
        async move {
            self.config.validate()?;
            let mut engine = self
                .engine
                .lock()
                .take()
                .ok_or(LifecycleError::Terminated)?;

            tracing::info!(
                l = self.config.l,
                d = self.config.d,
                column = %self.config.column,
                row = %self.config.row,
                "SMPTE 2022-1 FEC generator starting"
            );

            let std_socket = socket::open_event_socket(self.config.media, self.config.media_ttl)?;
            let media_socket = UdpSocket::from_std(std_socket)
                .map_err(|e| SetupError::new(SetupStep::Socket, self.config.media, e))?;
            let send_socket =
                socket::open_send_socket(self.config.column, self.config.fec_ttl, true)?;
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
            let deadline = self.config.max_runtime.map(|limit| started + limit);
            let mut buf = pipeline.receive_buffer();
            tokio::pin!(shutdown);

            let result = loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Shutdown signal received");
                        break Ok(());
                    }
                    _ = self.lifecycle.stopped() => break Ok(()),
                    _ = runtime_limit(deadline) => {
                        tracing::info!("Runtime limit reached");
                        break Ok(());
                    }
                    received = media_socket.recv_from(&mut buf) => match received {
                        Ok((n, from)) => pipeline.datagram_received(&buf[..n], from),
                        Err(e) if socket::is_transient(&e) => {
                            tracing::debug!(error = %e, "Transient receive error");
                        }
                        Err(e) => break Err(e),
                    }
                }
            };
            drop(media_socket);

            let summary = stats.summary(started.elapsed());
            match result {
                Ok(()) => {
                    summary.log();
                    Ok(summary)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Event loop failed");
                    Err(e.into())
                }
            }
        }
        .instrument(span)
        .await
    }
}

async fn runtime_limit(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<E: FecEngine> Driver for EventFecGenerator<E> {
    fn kind(&self) -> DriverKind {
        DriverKind::EventDriven
    }

    /// Run on a dedicated single-threaded runtime until stopped
    fn run(&self) -> Result<RunSummary> {
        let guard = self.lifecycle.begin()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SetupError::new(SetupStep::Runtime, self.config.media, e))?;

        runtime.block_on(self.serve(guard, std::future::pending()))
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        EventFecGenerator::local_addr(self)
    }
}

impl<E: FecEngine> std::fmt::Debug for EventFecGenerator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFecGenerator")
            .field("media", &self.config.media)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::fec::FecGenerator;
    use crate::rtp::RtpPacket;
    use bytes::Bytes;
    use std::time::Duration;

    fn loopback_config() -> RunConfig {
        let mut config = RunConfig::default().driver(DriverKind::EventDriven);
        config.media = "127.0.0.1:0".parse().unwrap();
        config.column = "127.0.0.1:9".parse().unwrap();
        config.row = "127.0.0.1:9".parse().unwrap();
        config
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_loop() {
        let generator = EventFecGenerator::new(loopback_config(), FecGenerator::new(5, 6));

        let summary = generator
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(summary.datagrams, 0);
        assert_eq!(generator.state(), GeneratorState::Stopped);
    }

    #[tokio::test]
    async fn test_runtime_limit() {
        let config = loopback_config().stop_after(Duration::from_millis(200));
        let generator = EventFecGenerator::new(config, FecGenerator::new(5, 6));

        let summary = tokio::time::timeout(
            Duration::from_secs(2),
            generator.run_until(std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(summary.duration >= Duration::from_millis(200));
        assert_eq!(generator.state(), GeneratorState::Stopped);
    }

    #[tokio::test]
    async fn test_callback_survives_malformed_datagram() {
        let generator = Arc::new(EventFecGenerator::new(
            loopback_config(),
            FecGenerator::new(5, 6),
        ));
        let stop = generator.stop_handle();

        let task = {
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { generator.run_until(std::future::pending()).await })
        };

        let addr = loop {
            if let Some(addr) = generator.local_addr() {
                if generator.is_running() {
                    break addr;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[1, 2, 3, 4], addr).await.unwrap();
        let valid = RtpPacket::create(1, 0, 33, Bytes::from_static(&[0x47; 188]));
        sender.send_to(&valid.to_bytes(), addr).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(generator.is_running());
        stop.stop();

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.datagrams, 2);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.forwarded, 1);
    }

    #[tokio::test]
    async fn test_run_until_twice() {
        let generator = EventFecGenerator::new(loopback_config(), FecGenerator::new(5, 6));
        generator.run_until(async {}).await.unwrap();

        assert!(matches!(
            generator.run_until(async {}).await,
            Err(Error::Lifecycle(LifecycleError::Terminated))
        ));
    }
}
