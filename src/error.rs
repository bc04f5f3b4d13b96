//! Error types
//!
//! Every fallible operation in the crate returns [`Result`]. Setup failures are
//! fatal and surface before a generator enters the running state; decode and
//! transmit failures are recovered by the drivers and only logged.

use std::fmt;
use std::io;

use crate::config::MulticastEndpoint;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or runtime setup failed
    Setup(SetupError),
    /// Inbound datagram is not a valid RTP packet
    Decode(DecodeError),
    /// Parity packet could not be sent
    Transmit(TransmitError),
    /// Generator lifecycle violation
    Lifecycle(LifecycleError),
    /// Invalid configuration
    Config(ConfigError),
    /// Receive path failed while running
    Io(io::Error),
    /// Termination handler could not be installed
    Signal(String),
    /// The driver thread panicked
    WorkerPanicked,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Setup(e) => write!(f, "Setup error: {}", e),
            Error::Decode(e) => write!(f, "Decode error: {}", e),
            Error::Transmit(e) => write!(f, "Transmit error: {}", e),
            Error::Lifecycle(e) => write!(f, "{}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Signal(msg) => write!(f, "Signal handler error: {}", msg),
            Error::WorkerPanicked => write!(f, "Generator thread panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Setup(e) => Some(&e.source),
            Error::Transmit(e) => Some(&e.source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Self {
        Error::Setup(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<TransmitError> for Error {
    fn from(e: TransmitError) -> Self {
        Error::Transmit(e)
    }
}

impl From<LifecycleError> for Error {
    fn from(e: LifecycleError) -> Self {
        Error::Lifecycle(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

/// Which setup step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Creating the socket or setting its options
    Socket,
    /// Binding to the local port
    Bind,
    /// Joining the multicast group
    JoinGroup,
    /// Building the cooperative runtime
    Runtime,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupStep::Socket => write!(f, "socket"),
            SetupStep::Bind => write!(f, "bind"),
            SetupStep::JoinGroup => write!(f, "join group"),
            SetupStep::Runtime => write!(f, "runtime"),
        }
    }
}

/// Fatal failure while acquiring the receive or send resources
#[derive(Debug)]
pub struct SetupError {
    /// Step that failed
    pub step: SetupStep,
    /// Endpoint the step concerned
    pub endpoint: MulticastEndpoint,
    /// Underlying OS error
    pub source: io::Error,
}

impl SetupError {
    pub fn new(step: SetupStep, endpoint: MulticastEndpoint, source: io::Error) -> Self {
        Self {
            step,
            endpoint,
            source,
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.step, self.endpoint, self.source)
    }
}

/// Malformed inbound datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Datagram shorter than the fixed RTP header
    TooShort(usize),
    /// RTP version field is not 2
    BadVersion(u8),
    /// CSRC list, header extension or padding runs past the datagram
    Truncated,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort(len) => write!(f, "datagram too short ({} bytes)", len),
            DecodeError::BadVersion(v) => write!(f, "unsupported RTP version {}", v),
            DecodeError::Truncated => write!(f, "truncated RTP header"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Parity packet send failure
#[derive(Debug)]
pub struct TransmitError {
    /// Destination the packet was meant for
    pub endpoint: MulticastEndpoint,
    /// Underlying OS error
    pub source: io::Error,
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "send to {} failed: {}", self.endpoint, self.source)
    }
}

/// Lifecycle violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// `run()` called while the generator is starting or running
    AlreadyRunning,
    /// `run()` called on a generator that already stopped
    Terminated,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::AlreadyRunning => write!(f, "SMPTE 2022-1 FEC generator already running"),
            LifecycleError::Terminated => {
                write!(f, "SMPTE 2022-1 FEC generator stopped, create a new one")
            }
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Invalid run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Endpoint is not `a.b.c.d:port`
    InvalidEndpoint(String),
    /// Matrix dimensions outside 1..=255
    InvalidMatrix { l: usize, d: usize },
    /// Receive timeout of zero
    InvalidTimeout,
    /// Parity TTL below 2
    InvalidTtl(u32),
    /// Unknown driver name
    InvalidDriver(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidEndpoint(s) => write!(f, "invalid IPv4 endpoint: {}", s),
            ConfigError::InvalidMatrix { l, d } => {
                write!(f, "invalid FEC matrix size {} x {} (each must be 1..=255)", l, d)
            }
            ConfigError::InvalidTimeout => write!(f, "receive timeout must be non-zero"),
            ConfigError::InvalidTtl(ttl) => write!(f, "FEC multicast TTL {} is below 2", ttl),
            ConfigError::InvalidDriver(s) => write!(f, "unknown driver: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
