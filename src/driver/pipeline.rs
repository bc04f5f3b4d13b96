//! Receive path shared by both drivers: decode, then hand over to the engine

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{DecodeError, Error};
use crate::fec::FecEngine;
use crate::rtp::RtpPacket;
use crate::stats::RunStats;

/// Decodes inbound datagrams and forwards valid media to the engine
pub struct MediaPipeline<E: FecEngine> {
    engine: E,
    stats: Arc<RunStats>,
    max_datagram: usize,
}

impl<E: FecEngine> MediaPipeline<E> {
    /// Datagrams longer than `max_datagram` are dropped
    pub fn new(engine: E, stats: Arc<RunStats>, max_datagram: usize) -> Self {
        Self {
            engine,
            stats,
            max_datagram,
        }
    }

    /// Buffer for one receive
    ///
    /// One byte longer than the largest accepted datagram, so a datagram the
    /// kernel had to cut short shows up as oversized instead of as a valid
    /// packet with a truncated payload.
    pub fn receive_buffer(&self) -> Vec<u8> {
        vec![0u8; self.max_datagram + 1]
    }

    /// Process one datagram
    ///
    /// Malformed datagrams are logged and dropped; they never reach the engine
    /// and never fail the caller's loop.
    pub fn datagram_received(&mut self, datagram: &[u8], from: SocketAddr) {
        RunStats::incr(&self.stats.datagrams);

        if datagram.len() > self.max_datagram {
            RunStats::incr(&self.stats.invalid);
            tracing::warn!(
                limit = self.max_datagram,
                from = %from,
                "Dropping datagram larger than the receive buffer"
            );
            return;
        }

        let media = match RtpPacket::from_slice(datagram) {
            Ok(media) => media,
            Err(Error::Decode(DecodeError::TooShort(len))) => {
                RunStats::incr(&self.stats.invalid);
                tracing::debug!(len = len, from = %from, "Dropping datagram shorter than RTP header");
                return;
            }
            Err(e) => {
                RunStats::incr(&self.stats.invalid);
                tracing::warn!(error = %e, from = %from, "Dropping malformed media packet");
                return;
            }
        };

        tracing::debug!(
            seq = media.sequence,
            ts = media.timestamp,
            psize = media.payload_size(),
            ssrc = media.ssrc,
            from = %from,
            "Incoming media packet"
        );

        self.engine.put_media(&media);
        RunStats::incr(&self.stats.forwarded);
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn stats(&self) -> &Arc<RunStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fec::FecHandler;
    use bytes::Bytes;
    use std::sync::atomic::Ordering;

    #[derive(Default)]
    struct SeqLog(Vec<u16>);

    impl FecEngine for SeqLog {
        fn register_handler(&mut self, _handler: Box<dyn FecHandler>) {}

        fn put_media(&mut self, media: &RtpPacket) {
            self.0.push(media.sequence);
        }
    }

    fn from() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    fn datagram(seq: u16) -> Bytes {
        RtpPacket::create(seq, 0, 33, Bytes::from_static(&[0x47; 188])).to_bytes()
    }

    #[test]
    fn test_forwards_in_arrival_order() {
        let stats = Arc::new(RunStats::new());
        let mut pipeline = MediaPipeline::new(SeqLog::default(), stats.clone(), 1500);

        for seq in [3, 1, 2] {
            pipeline.datagram_received(&datagram(seq), from());
        }

        assert_eq!(pipeline.engine().0, vec![3, 1, 2]);
        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_malformed_dropped_and_loop_continues() {
        let stats = Arc::new(RunStats::new());
        let mut pipeline = MediaPipeline::new(SeqLog::default(), stats.clone(), 1500);

        pipeline.datagram_received(&datagram(1), from());
        pipeline.datagram_received(&[0xDE, 0xAD, 0xBE, 0xEF], from());
        pipeline.datagram_received(&[0x40; 20], from());
        pipeline.datagram_received(&datagram(2), from());

        assert_eq!(pipeline.engine().0, vec![1, 2]);
        assert_eq!(stats.datagrams.load(Ordering::Relaxed), 4);
        assert_eq!(stats.invalid.load(Ordering::Relaxed), 2);
        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_oversized_datagram_dropped() {
        let stats = Arc::new(RunStats::new());
        let mut pipeline = MediaPipeline::new(SeqLog::default(), stats.clone(), 1500);
        let oversized = RtpPacket::create(1, 0, 33, Bytes::from(vec![0x47; 2000])).to_bytes();

        // What a receive into the pipeline's buffer leaves of it
        let mut buf = pipeline.receive_buffer();
        let n = oversized.len().min(buf.len());
        buf[..n].copy_from_slice(&oversized[..n]);
        pipeline.datagram_received(&buf[..n], from());

        let fits = RtpPacket::create(2, 0, 33, Bytes::from(vec![0x47; 1488])).to_bytes();
        assert_eq!(fits.len(), 1500);
        pipeline.datagram_received(&fits, from());

        assert_eq!(pipeline.engine().0, vec![2]);
        assert_eq!(stats.invalid.load(Ordering::Relaxed), 1);
        assert_eq!(stats.forwarded.load(Ordering::Relaxed), 1);
    }
}
