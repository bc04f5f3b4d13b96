//! FEC matrix engine
//!
//! The drivers only depend on the [`FecEngine`] and [`FecHandler`] seams.
//! [`FecGenerator`] is the stock engine: it accumulates an L x D window of
//! media packets and emits one column and one row parity packet per complete
//! window.
//!
//! ```text
//!  P  P  P  P  P | R   <- row parity over the first row
//!  P  P  P  P  P |
//!  P  P  P  P  P |
//!  --------------+
//!  C                   <- column parity over the first column
//! ```

use std::fmt;

use super::packet::{Orientation, ParityPacket};
use crate::rtp::RtpPacket;

/// Receives engine notifications
///
/// Called synchronously from `put_media`, in emission order.
pub trait FecHandler: Send {
    /// A column parity packet is ready for output
    fn on_new_column(&mut self, column: &ParityPacket);

    /// A row parity packet is ready for output
    fn on_new_row(&mut self, row: &ParityPacket);

    /// `media` broke sequence continuity, accumulation restarted with it
    fn on_reset(&mut self, media: &RtpPacket, expected: u16);
}

/// Parity accumulator consumed by the drivers
pub trait FecEngine: Send {
    /// Install the handler that receives column/row/reset notifications
    fn register_handler(&mut self, handler: Box<dyn FecHandler>);

    /// Submit one media packet, in arrival order
    fn put_media(&mut self, media: &RtpPacket);
}

/// L x D parity matrix engine
pub struct FecGenerator {
    l: u8,
    d: u8,
    medias: Vec<RtpPacket>,
    received: u64,
    column_sequence: u16,
    row_sequence: u16,
    media_sequence: Option<u16>,
    handler: Option<Box<dyn FecHandler>>,
}

impl FecGenerator {
    /// Create an engine for an L x D matrix
    ///
    /// Dimensions are clamped to at least 1.
    pub fn new(l: u8, d: u8) -> Self {
        let (l, d) = (l.max(1), d.max(1));
        Self {
            l,
            d,
            medias: Vec::with_capacity(l as usize * d as usize),
            received: 0,
            column_sequence: 1,
            row_sequence: 1,
            media_sequence: None,
            handler: None,
        }
    }

    /// Create an engine with its handler already registered
    pub fn with_handler(l: u8, d: u8, handler: Box<dyn FecHandler>) -> Self {
        let mut generator = Self::new(l, d);
        generator.handler = Some(handler);
        generator
    }

    pub fn matrix_size(&self) -> usize {
        self.l as usize * self.d as usize
    }

    /// Media packets accepted so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Next expected media sequence number
    pub fn media_sequence(&self) -> Option<u16> {
        self.media_sequence
    }

    /// Sequence numbers currently buffered
    pub fn buffered(&self) -> Vec<u16> {
        self.medias.iter().map(|m| m.sequence).collect()
    }

    fn emit(&mut self) {
        let l = self.l as usize;
        let column = ParityPacket::compute(
            Orientation::Column,
            self.column_sequence,
            self.l,
            self.d,
            self.medias.iter().step_by(l),
        );
        let row = ParityPacket::compute(
            Orientation::Row,
            self.row_sequence,
            self.l,
            self.d,
            self.medias.iter().take(l),
        );

        if let Some(column) = column {
            self.column_sequence = self.column_sequence.wrapping_add(1);
            if let Some(handler) = self.handler.as_mut() {
                handler.on_new_column(&column);
            }
        }
        if let Some(row) = row {
            self.row_sequence = self.row_sequence.wrapping_add(1);
            if let Some(handler) = self.handler.as_mut() {
                handler.on_new_row(&row);
            }
        }

        self.medias.clear();
    }
}

impl FecEngine for FecGenerator {
    fn register_handler(&mut self, handler: Box<dyn FecHandler>) {
        self.handler = Some(handler);
    }

    fn put_media(&mut self, media: &RtpPacket) {
        self.received += 1;

        if let Some(expected) = self.media_sequence {
            if media.sequence != expected {
                if let Some(handler) = self.handler.as_mut() {
                    handler.on_reset(media, expected);
                }
                self.medias.clear();
            }
        }
        self.media_sequence = Some(media.sequence.wrapping_add(1));
        self.medias.push(media.clone());

        if self.medias.len() >= self.matrix_size() {
            self.emit();
        }
    }
}

impl fmt::Display for FecGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix size L x D            = {} x {}", self.l, self.d)?;
        writeln!(f, "Total media packets received = {}", self.received)?;
        writeln!(f, "Column sequence number       = {}", self.column_sequence)?;
        writeln!(f, "Row    sequence number       = {}", self.row_sequence)?;
        match self.media_sequence {
            Some(seq) => writeln!(f, "Media  sequence number       = {}", seq)?,
            None => writeln!(f, "Media  sequence number       = None")?,
        }
        write!(f, "Medias buffer (seq. numbers) = {:?}", self.buffered())
    }
}

impl fmt::Debug for FecGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FecGenerator")
            .field("l", &self.l)
            .field("d", &self.d)
            .field("buffered", &self.medias.len())
            .field("media_sequence", &self.media_sequence)
            .finish()
    }
}
