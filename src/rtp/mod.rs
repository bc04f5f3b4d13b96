//! RTP packet handling
//!
//! Inbound media arrives as RTP over UDP; outbound parity packets are
//! RTP-encapsulated as well.

pub mod packet;

pub use packet::{RtpPacket, DYNAMIC_PT, RTP_HEADER_SIZE, RTP_VERSION};
