//! SMPTE 2022-1 parity packets
//!
//! FEC header carried at the start of every parity payload:
//! ```text
//! +----------------+----------------+
//! | SNBase low (16)| Len. recov (16)|
//! +-+--------------+----------------+
//! |E| PT recov (7) |   Mask (24)    |
//! +-+--------------+----------------+
//! |          TS recovery (32)        |
//! +-+-+-----+-----+--------+--------+--------------+
//! |N|D|type |index| Offset |   NA   | SNBase ext(8)|
//! +-+-+-----+-----+--------+--------+--------------+
//! ```
//! The recovery fields are XORs over the protected media packets, followed by
//! the XOR of their payloads.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::rtp::{RtpPacket, DYNAMIC_PT};

/// Size of the FEC header
pub const FEC_HEADER_SIZE: usize = 16;

/// Which FEC stream a parity packet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// First FEC stream, protects D packets spaced L apart
    Column,
    /// Second FEC stream, protects L consecutive packets
    Row,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Column => write!(f, "COL"),
            Orientation::Row => write!(f, "ROW"),
        }
    }
}

/// A column or row parity packet produced by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityPacket {
    pub orientation: Orientation,
    /// Engine-assigned, independent per stream
    pub sequence: u16,
    /// First media sequence number of the matrix window
    pub snbase: u16,
    /// Matrix columns
    pub l: u8,
    /// Matrix rows
    pub d: u8,
    /// XOR of the protected payload lengths
    pub length_recovery: u16,
    /// XOR of the protected payload types
    pub pt_recovery: u8,
    /// XOR of the protected timestamps
    pub timestamp_recovery: u32,
    /// XOR of the protected payloads, zero-padded to the longest
    pub payload: Bytes,
}

impl ParityPacket {
    /// XOR a set of media packets into a parity packet
    pub fn compute<'a>(
        orientation: Orientation,
        sequence: u16,
        l: u8,
        d: u8,
        medias: impl IntoIterator<Item = &'a RtpPacket>,
    ) -> Option<Self> {
        let mut medias = medias.into_iter().peekable();
        let snbase = medias.peek()?.sequence;

        let mut length_recovery = 0u16;
        let mut pt_recovery = 0u8;
        let mut timestamp_recovery = 0u32;
        let mut payload: Vec<u8> = Vec::new();

        for media in medias {
            length_recovery ^= media.payload_size() as u16;
            pt_recovery ^= media.payload_type;
            timestamp_recovery ^= media.timestamp;
            if payload.len() < media.payload.len() {
                payload.resize(media.payload.len(), 0);
            }
            for (acc, byte) in payload.iter_mut().zip(media.payload.iter()) {
                *acc ^= byte;
            }
        }

        Some(Self {
            orientation,
            sequence,
            snbase,
            l,
            d,
            length_recovery,
            pt_recovery: pt_recovery & 0x7F,
            timestamp_recovery,
            payload: Bytes::from(payload),
        })
    }

    /// `Offset` header field
    pub fn offset(&self) -> u8 {
        match self.orientation {
            Orientation::Column => self.l,
            Orientation::Row => 1,
        }
    }

    /// `NA` header field
    pub fn number_associated(&self) -> u8 {
        match self.orientation {
            Orientation::Column => self.d,
            Orientation::Row => self.l,
        }
    }

    /// FEC header followed by the parity payload
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FEC_HEADER_SIZE + self.payload.len());
        buf.put_u16(self.snbase);
        buf.put_u16(self.length_recovery);
        buf.put_u8(0x80 | self.pt_recovery); // E = 1
        buf.put_uint(0, 3); // mask
        buf.put_u32(self.timestamp_recovery);
        let d_bit = match self.orientation {
            Orientation::Column => 0,
            Orientation::Row => 0x40,
        };
        buf.put_u8(d_bit); // N = 0, type = 0, index = 0
        buf.put_u8(self.offset());
        buf.put_u8(self.number_associated());
        buf.put_u8(0); // SNBase ext bits
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// RTP encapsulation sent on the wire
    ///
    /// The RTP timestamp is zero; the recovery timestamp travels in the FEC header.
    pub fn to_rtp(&self) -> RtpPacket {
        RtpPacket::create(self.sequence, 0, DYNAMIC_PT, self.to_bytes())
    }
}
