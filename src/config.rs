//! Generator configuration

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Default inbound media stream
pub const DEFAULT_MEDIA: &str = "239.232.0.222:5004";
/// Default column FEC stream
pub const DEFAULT_COL: &str = "232.232.0.222:5006";
/// Default row FEC stream
pub const DEFAULT_ROW: &str = "232.232.0.222:5008";
/// Largest UDP payload, default receive buffer size
pub const MAX_DATAGRAM_SIZE: usize = 65535;
/// Lowest multicast TTL accepted for parity packets
pub const MIN_FEC_TTL: u32 = 2;

/// An IPv4 host and UDP port
///
/// Usually a multicast group; a unicast address is accepted as well, in which
/// case no group membership is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MulticastEndpoint {
    addr: SocketAddrV4,
}

impl MulticastEndpoint {
    /// Create an endpoint from its parts
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            addr: SocketAddrV4::new(ip, port),
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        *self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Whether the host is in 224.0.0.0/4
    pub fn is_multicast(&self) -> bool {
        self.addr.ip().is_multicast()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.addr)
    }
}

impl FromStr for MulticastEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<SocketAddrV4>()
            .map(|addr| Self { addr })
            .map_err(|_| ConfigError::InvalidEndpoint(s.to_string()))
    }
}

impl fmt::Display for MulticastEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

impl From<SocketAddrV4> for MulticastEndpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self { addr }
    }
}

/// Scheduling model used to drive the receive path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// Dedicated thread blocked on a timed receive
    #[default]
    Polling,
    /// Single cooperative event loop, one callback per datagram
    EventDriven,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Polling => write!(f, "polling"),
            DriverKind::EventDriven => write!(f, "event"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "polling" | "socket" => Ok(DriverKind::Polling),
            "event" | "event-driven" => Ok(DriverKind::EventDriven),
            other => Err(ConfigError::InvalidDriver(other.to_string())),
        }
    }
}

/// Run configuration
///
/// Built once by the caller and handed to a generator, which keeps it
/// unchanged for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Inbound RTP media stream
    pub media: MulticastEndpoint,

    /// Destination of column parity packets
    pub column: MulticastEndpoint,

    /// Destination of row parity packets
    pub row: MulticastEndpoint,

    /// Horizontal size of the FEC matrix (columns)
    pub l: u8,

    /// Vertical size of the FEC matrix (rows)
    pub d: u8,

    /// Receive timeout (None = blocking, stop requests wait for the next datagram)
    pub receive_timeout: Option<Duration>,

    /// Stop automatically after this much wall time
    pub max_runtime: Option<Duration>,

    /// Largest datagram accepted; longer ones are dropped as invalid
    pub recv_buffer_size: usize,

    /// Multicast TTL of outbound parity packets
    pub fec_ttl: u32,

    /// Multicast TTL set on the media socket by the event-driven driver
    pub media_ttl: u32,

    /// Driver implementation
    pub driver: DriverKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            media: MulticastEndpoint::new(Ipv4Addr::new(239, 232, 0, 222), 5004),
            column: MulticastEndpoint::new(Ipv4Addr::new(232, 232, 0, 222), 5006),
            row: MulticastEndpoint::new(Ipv4Addr::new(232, 232, 0, 222), 5008),
            l: 5,
            d: 6,
            receive_timeout: None,
            max_runtime: None,
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            fec_ttl: 2,
            media_ttl: 1,
            driver: DriverKind::Polling,
        }
    }
}

impl RunConfig {
    /// Create a config for the given endpoints and matrix size
    ///
    /// Both dimensions must be in 1..=255 since they travel in 8-bit header fields.
    pub fn new(
        media: MulticastEndpoint,
        column: MulticastEndpoint,
        row: MulticastEndpoint,
        l: usize,
        d: usize,
    ) -> Result<Self> {
        let (l, d) = match (u8::try_from(l), u8::try_from(d)) {
            (Ok(l8), Ok(d8)) if l8 > 0 && d8 > 0 => (l8, d8),
            _ => return Err(ConfigError::InvalidMatrix { l, d }.into()),
        };

        Ok(Self {
            media,
            column,
            row,
            l,
            d,
            ..Default::default()
        })
    }

    /// Set the receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Stop automatically after `limit`
    pub fn stop_after(mut self, limit: Duration) -> Self {
        self.max_runtime = Some(limit);
        self
    }

    /// Select the driver implementation
    pub fn driver(mut self, driver: DriverKind) -> Self {
        self.driver = driver;
        self
    }

    /// Set the largest accepted datagram size
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.clamp(crate::rtp::RTP_HEADER_SIZE, MAX_DATAGRAM_SIZE);
        self
    }

    /// Set the multicast TTL of parity packets (at least 2)
    pub fn fec_ttl(mut self, ttl: u32) -> Self {
        self.fec_ttl = ttl.max(MIN_FEC_TTL);
        self
    }

    /// Number of media packets per matrix
    pub fn matrix_size(&self) -> usize {
        self.l as usize * self.d as usize
    }

    /// Timeout actually applied to the receive socket
    ///
    /// A runtime limit needs a finite timeout to be observed without traffic,
    /// so one second is used when only the limit is set.
    pub fn effective_timeout(&self) -> Option<Duration> {
        match (self.receive_timeout, self.max_runtime) {
            (Some(t), _) => Some(t),
            (None, Some(_)) => Some(Duration::from_secs(1)),
            (None, None) => None,
        }
    }

    /// Check values the builder methods cannot rule out
    pub fn validate(&self) -> Result<()> {
        if self.l == 0 || self.d == 0 {
            return Err(ConfigError::InvalidMatrix {
                l: self.l as usize,
                d: self.d as usize,
            }
            .into());
        }
        if self.receive_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout.into());
        }
        if self.fec_ttl < MIN_FEC_TTL {
            return Err(ConfigError::InvalidTtl(self.fec_ttl).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> (MulticastEndpoint, MulticastEndpoint, MulticastEndpoint) {
        (
            DEFAULT_MEDIA.parse().unwrap(),
            DEFAULT_COL.parse().unwrap(),
            DEFAULT_ROW.parse().unwrap(),
        )
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();

        assert_eq!(config.media.to_string(), DEFAULT_MEDIA);
        assert_eq!(config.column.to_string(), DEFAULT_COL);
        assert_eq!(config.row.to_string(), DEFAULT_ROW);
        assert_eq!((config.l, config.d), (5, 6));
        assert_eq!(config.matrix_size(), 30);
        assert!(config.receive_timeout.is_none());
        assert!(config.max_runtime.is_none());
        assert_eq!(config.fec_ttl, 2);
        assert_eq!(config.recv_buffer_size, MAX_DATAGRAM_SIZE);
        assert_eq!(config.driver, DriverKind::Polling);
    }

    #[test]
    fn test_endpoint_parse() {
        let endpoint: MulticastEndpoint = "239.232.0.222:5004".parse().unwrap();

        assert_eq!(endpoint.ip(), Ipv4Addr::new(239, 232, 0, 222));
        assert_eq!(endpoint.port(), 5004);
        assert!(endpoint.is_multicast());
    }

    #[test]
    fn test_endpoint_parse_invalid() {
        assert!("239.232.0.256:5004".parse::<MulticastEndpoint>().is_err());
        assert!("example.com:5004".parse::<MulticastEndpoint>().is_err());
        assert!("239.232.0.222".parse::<MulticastEndpoint>().is_err());
        assert!("[::1]:5004".parse::<MulticastEndpoint>().is_err());
    }

    #[test]
    fn test_unicast_endpoint_accepted() {
        let endpoint: MulticastEndpoint = "127.0.0.1:5004".parse().unwrap();
        assert!(!endpoint.is_multicast());
    }

    #[test]
    fn test_new_rejects_zero_matrix() {
        let (media, col, row) = endpoints();

        assert!(RunConfig::new(media, col, row, 0, 6).is_err());
        assert!(RunConfig::new(media, col, row, 5, 0).is_err());
        assert!(RunConfig::new(media, col, row, 256, 6).is_err());
        assert!(RunConfig::new(media, col, row, 5, 6).is_ok());
    }

    #[test]
    fn test_effective_timeout() {
        let config = RunConfig::default();
        assert_eq!(config.effective_timeout(), None);

        let config = RunConfig::default().stop_after(Duration::from_secs(3));
        assert_eq!(config.effective_timeout(), Some(Duration::from_secs(1)));

        let config = RunConfig::default()
            .receive_timeout(Duration::from_millis(200))
            .stop_after(Duration::from_secs(3));
        assert_eq!(config.effective_timeout(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = RunConfig::default().receive_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_low_fec_ttl() {
        let mut config = RunConfig::default();
        config.fec_ttl = 1;

        match config.validate() {
            Err(crate::error::Error::Config(ConfigError::InvalidTtl(1))) => {}
            other => panic!("expected InvalidTtl, got {:?}", other),
        }

        config.fec_ttl = MIN_FEC_TTL;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chaining() {
        let config = RunConfig::default()
            .receive_timeout(Duration::from_secs(1))
            .stop_after(Duration::from_secs(3))
            .driver(DriverKind::EventDriven)
            .fec_ttl(1)
            .recv_buffer_size(4);

        assert_eq!(config.receive_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.max_runtime, Some(Duration::from_secs(3)));
        assert_eq!(config.driver, DriverKind::EventDriven);
        assert_eq!(config.fec_ttl, 2);
        assert_eq!(config.recv_buffer_size, crate::rtp::RTP_HEADER_SIZE);
    }

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!("polling".parse::<DriverKind>().unwrap(), DriverKind::Polling);
        assert_eq!("event".parse::<DriverKind>().unwrap(), DriverKind::EventDriven);
        assert!("threads".parse::<DriverKind>().is_err());
    }
}
