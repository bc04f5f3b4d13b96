//! RTP packet parsing and generation
//!
//! Fixed header layout (RFC 3550 section 5.1):
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, Result};

/// Size of the fixed RTP header
pub const RTP_HEADER_SIZE: usize = 12;

/// The only RTP version in use
pub const RTP_VERSION: u8 = 2;

/// Dynamic payload type carried by outbound parity packets
pub const DYNAMIC_PT: u8 = 96;

/// A decoded RTP packet
///
/// `payload` shares the datagram's allocation, cloning the packet is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Marker bit
    pub marker: bool,
    /// Payload type (7 bits)
    pub payload_type: u8,
    /// Sequence number, wraps at 16 bits
    pub sequence: u16,
    /// Media timestamp
    pub timestamp: u32,
    /// Synchronization source
    pub ssrc: u32,
    /// Contributing sources
    pub csrc: Vec<u32>,
    /// Payload, without header extension or padding
    pub payload: Bytes,
}

impl RtpPacket {
    /// Build a packet with no CSRC list, SSRC 0 and marker cleared
    pub fn create(sequence: u16, timestamp: u32, payload_type: u8, payload: Bytes) -> Self {
        Self {
            marker: false,
            payload_type: payload_type & 0x7F,
            sequence,
            timestamp,
            ssrc: 0,
            csrc: Vec::new(),
            payload,
        }
    }

    /// Parse a datagram
    ///
    /// Header extensions are skipped and padding is stripped from the payload.
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(DecodeError::TooShort(data.len()).into());
        }

        let first = data.get_u8();
        let version = first >> 6;
        if version != RTP_VERSION {
            return Err(DecodeError::BadVersion(version).into());
        }
        let padding = first & 0x20 != 0;
        let extension = first & 0x10 != 0;
        let csrc_count = (first & 0x0F) as usize;

        let second = data.get_u8();
        let sequence = data.get_u16();
        let timestamp = data.get_u32();
        let ssrc = data.get_u32();

        if data.len() < csrc_count * 4 {
            return Err(DecodeError::Truncated.into());
        }
        let csrc = (0..csrc_count).map(|_| data.get_u32()).collect();

        if extension {
            if data.len() < 4 {
                return Err(DecodeError::Truncated.into());
            }
            let _profile = data.get_u16();
            let words = data.get_u16() as usize;
            if data.len() < words * 4 {
                return Err(DecodeError::Truncated.into());
            }
            data.advance(words * 4);
        }

        if padding {
            let pad = match data.last() {
                Some(&n) if n != 0 && (n as usize) <= data.len() => n as usize,
                _ => return Err(DecodeError::Truncated.into()),
            };
            data.truncate(data.len() - pad);
        }

        Ok(Self {
            marker: second & 0x80 != 0,
            payload_type: second & 0x7F,
            sequence,
            timestamp,
            ssrc,
            csrc,
            payload: data,
        })
    }

    /// Parse a borrowed datagram, copying it once
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Self::parse(Bytes::copy_from_slice(data))
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Total encoded size
    pub fn len(&self) -> usize {
        RTP_HEADER_SIZE + self.csrc.len() * 4 + self.payload.len()
    }

    /// Serialize the packet
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_u8(RTP_VERSION << 6 | (self.csrc.len() as u8 & 0x0F));
        buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}
