//! Socket setup shared by both drivers
//!
//! Every failure here is fatal and reported as a [`SetupError`] naming the
//! step and endpoint, before the generator enters the running state.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::config::MulticastEndpoint;
use crate::error::{SetupError, SetupStep};

fn step<T>(
    result: io::Result<T>,
    step: SetupStep,
    endpoint: MulticastEndpoint,
) -> Result<T, SetupError> {
    result.map_err(|e| SetupError::new(step, endpoint, e))
}

/// Local address to bind for receiving `endpoint`
///
/// Unix hosts bind the group address itself so only that group is delivered;
/// elsewhere binding a group address fails and the wildcard is used.
fn bind_addr(endpoint: MulticastEndpoint) -> SocketAddr {
    if endpoint.is_multicast() && !cfg!(unix) {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, endpoint.port()))
    } else {
        endpoint.socket_addr()
    }
}

/// Create the inbound socket: address reuse, bind, group join on all interfaces
fn media_socket(endpoint: MulticastEndpoint) -> Result<Socket, SetupError> {
    let socket = step(
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)),
        SetupStep::Socket,
        endpoint,
    )?;
    step(socket.set_reuse_address(true), SetupStep::Socket, endpoint)?;
    step(
        socket.bind(&SockAddr::from(bind_addr(endpoint))),
        SetupStep::Bind,
        endpoint,
    )?;

    if endpoint.is_multicast() {
        step(
            socket.join_multicast_v4(&endpoint.ip(), &Ipv4Addr::UNSPECIFIED),
            SetupStep::JoinGroup,
            endpoint,
        )?;
        tracing::debug!(group = %endpoint.ip(), "Joined multicast group on all interfaces");
    }

    Ok(socket)
}

/// Inbound socket for the polling driver
///
/// `timeout` bounds each receive; `None` blocks until a datagram arrives.
pub fn open_polling_socket(
    endpoint: MulticastEndpoint,
    timeout: Option<Duration>,
) -> Result<UdpSocket, SetupError> {
    let socket = media_socket(endpoint)?;
    step(socket.set_read_timeout(timeout), SetupStep::Socket, endpoint)?;
    Ok(socket.into())
}

/// Inbound socket for the event-driven driver
///
/// Non-blocking, local loopback delivery disabled, explicit multicast TTL.
pub fn open_event_socket(endpoint: MulticastEndpoint, ttl: u32) -> Result<UdpSocket, SetupError> {
    let socket = media_socket(endpoint)?;
    step(socket.set_multicast_loop_v4(false), SetupStep::Socket, endpoint)?;
    step(socket.set_multicast_ttl_v4(ttl), SetupStep::Socket, endpoint)?;
    step(socket.set_nonblocking(true), SetupStep::Socket, endpoint)?;
    Ok(socket.into())
}

/// Outbound socket for parity packets
///
/// `endpoint` only labels errors; the socket sends to both FEC destinations.
pub fn open_send_socket(
    endpoint: MulticastEndpoint,
    ttl: u32,
    nonblocking: bool,
) -> Result<UdpSocket, SetupError> {
    let socket = step(
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)),
        SetupStep::Socket,
        endpoint,
    )?;
    step(socket.set_multicast_ttl_v4(ttl), SetupStep::Socket, endpoint)?;
    step(
        socket.bind(&SockAddr::from(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))),
        SetupStep::Bind,
        endpoint,
    )?;
    step(socket.set_nonblocking(nonblocking), SetupStep::Socket, endpoint)?;
    Ok(socket.into())
}

/// Receive errors that leave the socket usable
///
/// Timeouts, interrupted calls and ICMP errors reported on the socket are
/// skipped by both drivers; anything else ends the run.
pub fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
    )
}
