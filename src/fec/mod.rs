//! SMPTE 2022-1 forward error correction
//!
//! - Parity packet layout and XOR computation
//! - The matrix engine and its notification seams

pub mod generator;
pub mod packet;

pub use generator::{FecEngine, FecGenerator, FecHandler};
pub use packet::{Orientation, ParityPacket, FEC_HEADER_SIZE};
