//! Packet definition for the gimbal link.
//!
//! # Wire Format
//!
//! ```text
//! +--------+--------+--------+--------+------------------+--------+--------+
//! | 0xD0   | 0x0D   |   ID   | Length | Payload (Length) | CRC hi | CRC lo |
//! +--------+--------+--------+--------+------------------+--------+--------+
//! ```
//!
//! The CRC covers the four header bytes and the payload.

use heapless::Vec;

use super::checksum::Crc16;
use crate::error::{Error, Result};

/// First synchronization byte.
pub const SYNC1: u8 = 0xD0;

/// Second synchronization byte.
pub const SYNC2: u8 = 0x0D;

/// Header size in bytes (two sync bytes, ID, length).
pub const HEADER_SIZE: usize = 4;

/// Trailer size in bytes.
pub const CHECKSUM_SIZE: usize = 2;

/// Bytes on the wire beyond the payload.
pub const PACKET_OVERHEAD: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload a length byte can declare.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Largest packet on the wire.
pub const MAX_PACKET_SIZE: usize = PACKET_OVERHEAD + MAX_PAYLOAD_SIZE;

/// Packet ID sent as the discovery probe. The device answers any
/// datagram, so the ID only matters to a device that parses it.
pub const VERSION_REQUEST_ID: u8 = 0x43;

/// A complete packet, stored exactly as it appears on the wire.
///
/// The transport treats the packet as an opaque buffer; the accessors
/// exist for the protocol layer above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8, MAX_PACKET_SIZE>,
}

impl Packet {
    /// Builds a packet, computing its checksum.
    pub fn new(id: u8, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let mut bytes: Vec<u8, MAX_PACKET_SIZE> = Vec::new();
        bytes
            .extend_from_slice(&[SYNC1, SYNC2, id, payload.len() as u8])
            .and_then(|_| bytes.extend_from_slice(payload))
            .map_err(|_| Error::PayloadTooLarge(payload.len()))?;

        let checksum = Crc16::compute(&bytes);
        bytes
            .extend_from_slice(&checksum.to_be_bytes())
            .map_err(|_| Error::PayloadTooLarge(payload.len()))?;

        Ok(Self { bytes })
    }

    /// Builds the empty packet used to elicit a discovery reply.
    pub fn version_request() -> Result<Self> {
        Self::new(VERSION_REQUEST_ID, &[])
    }

    /// Wraps bytes that the assembler has already validated.
    pub(crate) fn from_wire(bytes: Vec<u8, MAX_PACKET_SIZE>) -> Self {
        Self { bytes }
    }

    /// Packet ID.
    pub fn id(&self) -> u8 {
        self.bytes[2]
    }

    /// Declared payload length.
    pub fn payload_len(&self) -> usize {
        self.bytes[3] as usize
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..HEADER_SIZE + self.payload_len()]
    }

    /// Checksum from the trailer.
    pub fn checksum(&self) -> u16 {
        let at = HEADER_SIZE + self.payload_len();
        u16::from_be_bytes([self.bytes[at], self.bytes[at + 1]])
    }

    /// Bytes this packet occupies on the wire.
    pub fn wire_size(&self) -> usize {
        PACKET_OVERHEAD + self.payload_len()
    }

    /// The full wire encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let packet = Packet::new(0x12, b"abc").unwrap();
        let bytes = packet.as_bytes();

        assert_eq!(&bytes[..HEADER_SIZE], &[SYNC1, SYNC2, 0x12, 3]);
        assert_eq!(packet.payload(), b"abc");
        assert_eq!(packet.wire_size(), PACKET_OVERHEAD + 3);
        assert_eq!(bytes.len(), packet.wire_size());
        assert_eq!(packet.checksum(), Crc16::compute(&bytes[..HEADER_SIZE + 3]));
    }

    #[test]
    fn test_version_request_is_empty() {
        let probe = Packet::version_request().unwrap();
        assert_eq!(probe.id(), VERSION_REQUEST_ID);
        assert!(probe.payload().is_empty());
        assert_eq!(probe.as_bytes().len(), PACKET_OVERHEAD);
    }

    #[test]
    fn test_max_payload() {
        let payload = [0x5A; MAX_PAYLOAD_SIZE];
        let packet = Packet::new(1, &payload).unwrap();
        assert_eq!(packet.wire_size(), MAX_PACKET_SIZE);

        let oversized = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Packet::new(1, &oversized),
            Err(Error::PayloadTooLarge(256))
        ));
    }
}
