//! SMPTE 2022-1 FEC stream generator
//!
//! Subscribes to a multicast RTP media stream, feeds every packet to an FEC
//! matrix engine and sends the column and row parity packets it produces to
//! their own multicast groups.
//!
//! # Example
//!
//! ```no_run
//! use smpte2022_rs::{driver, DriverKind, FecGenerator, RunConfig};
//! use std::time::Duration;
//!
//! let config = RunConfig::default()
//!     .driver(DriverKind::Polling)
//!     .receive_timeout(Duration::from_secs(1));
//!
//! let handle = driver::start(config, FecGenerator::new(5, 6))?;
//! smpte2022_rs::signal::install_termination_handler(handle.stop_handle())?;
//!
//! let summary = handle.wait()?;
//! println!("forwarded {} media packets", summary.forwarded);
//! # Ok::<(), smpte2022_rs::Error>(())
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod fec;
pub mod lifecycle;
pub mod rtp;
pub mod signal;
pub mod stats;

pub use config::{DriverKind, MulticastEndpoint, RunConfig};
pub use driver::{start, Driver, EventFecGenerator, GeneratorHandle, SocketFecGenerator};
pub use error::{Error, Result};
pub use fec::{FecEngine, FecGenerator, FecHandler, ParityPacket};
pub use lifecycle::{GeneratorState, StopHandle};
pub use rtp::RtpPacket;
pub use stats::RunSummary;
