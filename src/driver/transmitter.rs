//! Parity packet output
//!
//! The transmitter is the engine's [`FecHandler`]: every parity packet is
//! RTP-encapsulated and sent synchronously from inside the engine callback,
//! so packets leave in the order the engine produced them. Delivery is best
//! effort; a failed send is logged and counted, never retried.

use std::net::UdpSocket;
use std::sync::Arc;

use crate::config::MulticastEndpoint;
use crate::error::TransmitError;
use crate::fec::{FecHandler, Orientation, ParityPacket};
use crate::rtp::RtpPacket;
use crate::stats::RunStats;

/// Sends column and row parity packets to their destinations
pub struct FecTransmitter {
    socket: UdpSocket,
    column: MulticastEndpoint,
    row: MulticastEndpoint,
    stats: Arc<RunStats>,
}

impl FecTransmitter {
    pub fn new(
        socket: UdpSocket,
        column: MulticastEndpoint,
        row: MulticastEndpoint,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            socket,
            column,
            row,
            stats,
        }
    }

    /// Encapsulate and send one parity packet
    pub fn send(&self, parity: &ParityPacket) -> Result<(), TransmitError> {
        let endpoint = match parity.orientation {
            Orientation::Column => self.column,
            Orientation::Row => self.row,
        };

        tracing::debug!(
            kind = %parity.orientation,
            seq = parity.sequence,
            snbase = parity.snbase,
            l = parity.l,
            d = parity.d,
            trec = parity.timestamp_recovery,
            endpoint = %endpoint,
            "Send FEC packet"
        );

        let rtp = parity.to_rtp();
        self.socket
            .send_to(&rtp.to_bytes(), endpoint.socket_addr())
            .map(|_| ())
            .map_err(|source| TransmitError { endpoint, source })
    }

    fn transmit(&self, parity: &ParityPacket) {
        match self.send(parity) {
            Ok(()) => match parity.orientation {
                Orientation::Column => RunStats::incr(&self.stats.columns_sent),
                Orientation::Row => RunStats::incr(&self.stats.rows_sent),
            },
            Err(e) => {
                RunStats::incr(&self.stats.send_failures);
                tracing::warn!(seq = parity.sequence, error = %e, "Failed to send FEC packet");
            }
        }
    }
}

impl FecHandler for FecTransmitter {
    fn on_new_column(&mut self, column: &ParityPacket) {
        self.transmit(column);
    }

    fn on_new_row(&mut self, row: &ParityPacket) {
        self.transmit(row);
    }

    fn on_reset(&mut self, media: &RtpPacket, expected: u16) {
        RunStats::incr(&self.stats.resets);
        tracing::warn!(
            seq = media.sequence,
            expected = expected,
            "Media packet out of sequence, FEC matrix reset"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::SocketAddrV4;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::rtp::DYNAMIC_PT;

    fn receiver() -> (UdpSocket, MulticastEndpoint) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let endpoint = match socket.local_addr().unwrap() {
            std::net::SocketAddr::V4(addr) => MulticastEndpoint::from(addr),
            _ => unreachable!(),
        };
        (socket, endpoint)
    }

    fn parity(orientation: Orientation, sequence: u16) -> ParityPacket {
        let media = RtpPacket::create(500, 9000, 33, Bytes::from_static(&[1, 2, 3]));
        ParityPacket::compute(orientation, sequence, 5, 6, [&media]).unwrap()
    }

    #[test]
    fn test_sends_to_matching_endpoint() {
        let (col_rx, col) = receiver();
        let (row_rx, row) = receiver();
        let stats = Arc::new(RunStats::new());
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut transmitter = FecTransmitter::new(socket, col, row, stats.clone());

        transmitter.on_new_column(&parity(Orientation::Column, 7));
        transmitter.on_new_row(&parity(Orientation::Row, 8));

        let mut buf = [0u8; 1500];
        let (n, _) = col_rx.recv_from(&mut buf).unwrap();
        let rtp = RtpPacket::from_slice(&buf[..n]).unwrap();
        assert_eq!(rtp.sequence, 7);
        assert_eq!(rtp.timestamp, 0);
        assert_eq!(rtp.payload_type, DYNAMIC_PT);
        assert_eq!(rtp.payload, parity(Orientation::Column, 7).to_bytes());

        let (n, _) = row_rx.recv_from(&mut buf).unwrap();
        let rtp = RtpPacket::from_slice(&buf[..n]).unwrap();
        assert_eq!(rtp.sequence, 8);

        assert_eq!(stats.columns_sent.load(Ordering::Relaxed), 1);
        assert_eq!(stats.rows_sent.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_send_failure_is_counted() {
        let (_rx, col) = receiver();
        // Port 0 is not a valid destination
        let row = MulticastEndpoint::from(SocketAddrV4::new([127, 0, 0, 1].into(), 0));
        let stats = Arc::new(RunStats::new());
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut transmitter = FecTransmitter::new(socket, col, row, stats.clone());

        transmitter.on_new_row(&parity(Orientation::Row, 1));
        transmitter.on_new_column(&parity(Orientation::Column, 1));

        assert_eq!(stats.send_failures.load(Ordering::Relaxed), 1);
        assert_eq!(stats.columns_sent.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_reset_counted() {
        let (_rx, col) = receiver();
        let stats = Arc::new(RunStats::new());
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut transmitter = FecTransmitter::new(socket, col, col, stats.clone());

        let media = RtpPacket::create(9, 0, 33, Bytes::new());
        transmitter.on_reset(&media, 4);

        assert_eq!(stats.resets.load(Ordering::Relaxed), 1);
    }
}
