//! Core data structures for the gimbal link.
//!
//! This module contains the wire-level building blocks:
//! - Packet: the framed unit exchanged with the device
//! - Assembler: byte-stream framing with resynchronization
//! - Checksum: CRC-16 carried in each packet trailer

mod assembler;
mod checksum;
mod packet;

pub use assembler::{FrameAssembler, PacketAssembler};
pub use checksum::Crc16;
pub use packet::{
    CHECKSUM_SIZE, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, PACKET_OVERHEAD, Packet,
    SYNC1, SYNC2, VERSION_REQUEST_ID,
};
