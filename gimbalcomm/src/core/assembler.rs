//! Byte-stream framing.
//!
//! A [`FrameAssembler`] is fed one byte at a time and reports when those
//! bytes form a complete, validated packet. It owns its parse state, so a
//! packet may arrive across any number of reads.
//!
//! Rescanning a rejected frame can turn up several packets at once. They
//! are queued in order and handed out by later `feed` or `poll` calls.

use heapless::{Deque, Vec};
use log::{trace, warn};

use super::checksum::Crc16;
use super::packet::{HEADER_SIZE, MAX_PACKET_SIZE, PACKET_OVERHEAD, Packet, SYNC1, SYNC2};

/// Most packets one rejected frame can hide, plus the one completing it.
const MAX_QUEUED: usize = MAX_PACKET_SIZE / PACKET_OVERHEAD + 1;

/// Turns a byte stream into packets.
///
/// Implementations must be deterministic and must resynchronize on their
/// own after corrupt input.
pub trait FrameAssembler {
    /// Consumes one byte. Returns the oldest packet ready, if any.
    fn feed(&mut self, byte: u8) -> Option<Packet>;

    /// Returns a packet that is already complete without consuming input.
    ///
    /// Callers should drain this before feeding more bytes.
    fn poll(&mut self) -> Option<Packet> {
        None
    }

    /// Discards any partially assembled packet and any queued ones.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Sync1,
    Sync2,
    Id,
    Length,
    Payload,
    ChecksumHigh,
    ChecksumLow,
}

/// Assembler for the gimbal wire format (see [`Packet`]).
#[derive(Debug)]
pub struct PacketAssembler {
    state: ParseState,
    buf: Vec<u8, MAX_PACKET_SIZE>,
    crc: Crc16,
    payload_len: usize,
    checksum_high: u8,
    ready: Deque<Packet, MAX_QUEUED>,
    dropped: u64,
}

impl Default for PacketAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketAssembler {
    /// Creates an assembler hunting for a sync pattern.
    pub fn new() -> Self {
        Self {
            state: ParseState::Sync1,
            buf: Vec::new(),
            crc: Crc16::new(),
            payload_len: 0,
            checksum_high: 0,
            ready: Deque::new(),
            dropped: 0,
        }
    }

    /// Number of frames rejected for a bad checksum.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Bytes of the packet currently being assembled.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Complete packets waiting to be handed out.
    pub fn queued(&self) -> usize {
        self.ready.len()
    }

    fn enqueue(&mut self, packet: Packet) {
        if let Err(packet) = self.ready.push_back(packet) {
            self.dropped += 1;
            warn!(
                "assembler queue full, dropping packet id={:#04x}",
                packet.id()
            );
        }
    }

    fn clear(&mut self) {
        self.state = ParseState::Sync1;
        self.buf.clear();
        self.crc.reset();
        self.payload_len = 0;
        self.checksum_high = 0;
    }

    fn accept(&mut self, byte: u8, next: ParseState) -> bool {
        if self.buf.push(byte).is_err() {
            return false;
        }
        if next != ParseState::ChecksumLow {
            self.crc.update_byte(byte);
        }
        self.state = next;
        true
    }

    /// Advances the parser by one byte. Packets recovered by a rescan go
    /// straight to the queue; only a packet completed by `byte` itself is
    /// returned.
    fn step(&mut self, byte: u8) -> Option<Packet> {
        let ok = match self.state {
            ParseState::Sync1 => {
                if byte == SYNC1 {
                    self.clear();
                    self.accept(byte, ParseState::Sync2)
                } else {
                    true
                }
            }
            ParseState::Sync2 => {
                if byte == SYNC2 {
                    self.accept(byte, ParseState::Id)
                } else {
                    // A repeated first sync byte may itself start the packet.
                    self.clear();
                    if byte == SYNC1 {
                        self.accept(byte, ParseState::Sync2)
                    } else {
                        true
                    }
                }
            }
            ParseState::Id => self.accept(byte, ParseState::Length),
            ParseState::Length => {
                self.payload_len = byte as usize;
                let next = if self.payload_len == 0 {
                    ParseState::ChecksumHigh
                } else {
                    ParseState::Payload
                };
                self.accept(byte, next)
            }
            ParseState::Payload => {
                let next = if self.buf.len() + 1 == HEADER_SIZE + self.payload_len {
                    ParseState::ChecksumHigh
                } else {
                    ParseState::Payload
                };
                self.accept(byte, next)
            }
            ParseState::ChecksumHigh => {
                self.checksum_high = byte;
                self.accept(byte, ParseState::ChecksumLow)
            }
            ParseState::ChecksumLow => {
                if self.buf.push(byte).is_err() {
                    false
                } else {
                    let received = u16::from_be_bytes([self.checksum_high, byte]);
                    if received == self.crc.finalize() {
                        let bytes = std::mem::take(&mut self.buf);
                        self.clear();
                        let packet = Packet::from_wire(bytes);
                        trace!(
                            "assembled packet id={:#04x} len={}",
                            packet.id(),
                            packet.payload_len()
                        );
                        return Some(packet);
                    }
                    warn!(
                        "dropping frame with bad checksum: got {:#06x}, expected {:#06x}",
                        received,
                        self.crc.finalize()
                    );
                    false
                }
            }
        };

        if !ok {
            self.resync();
        }
        None
    }

    /// Rescans a rejected frame, skipping its first sync byte, in case real
    /// packets start inside it. Every packet found is queued in order.
    fn resync(&mut self) {
        self.dropped += 1;
        let stale = std::mem::take(&mut self.buf);
        self.clear();

        for &byte in stale.iter().skip(1) {
            if let Some(packet) = self.step(byte) {
                self.enqueue(packet);
            }
        }
    }
}

impl FrameAssembler for PacketAssembler {
    fn feed(&mut self, byte: u8) -> Option<Packet> {
        if let Some(packet) = self.step(byte) {
            if self.ready.is_empty() {
                return Some(packet);
            }
            self.enqueue(packet);
        }
        self.ready.pop_front()
    }

    fn poll(&mut self) -> Option<Packet> {
        self.ready.pop_front()
    }

    fn reset(&mut self) {
        self.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(assembler: &mut PacketAssembler, bytes: &[u8]) -> std::vec::Vec<Packet> {
        let mut out = std::vec::Vec::new();
        for &b in bytes {
            let mut next = assembler.feed(b);
            while let Some(packet) = next {
                out.push(packet);
                next = assembler.poll();
            }
        }
        out
    }

    /// A stray sync pair whose length byte covers all of `inner`, followed
    /// by a trailer that cannot match.
    fn bogus_frame_around(inner: &[Packet]) -> std::vec::Vec<u8> {
        let body: std::vec::Vec<u8> = inner.iter().flat_map(|p| p.as_bytes().to_vec()).collect();
        let mut stream = vec![SYNC1, SYNC2, 0x01, body.len() as u8];
        stream.extend_from_slice(&body);
        stream.extend_from_slice(&[0x00, 0x00]);
        stream
    }

    #[test]
    fn test_single_packet() {
        let packet = Packet::new(7, b"hello").unwrap();
        let mut assembler = PacketAssembler::new();

        let out = feed_all(&mut assembler, packet.as_bytes());
        assert_eq!(out, vec![packet]);
        assert_eq!(assembler.buffered(), 0);
    }

    #[test]
    fn test_packet_completes_on_last_byte_only() {
        let packet = Packet::new(1, b"xyz").unwrap();
        let bytes = packet.as_bytes();
        let mut assembler = PacketAssembler::new();

        for &b in &bytes[..bytes.len() - 1] {
            assert!(assembler.feed(b).is_none());
        }
        assert_eq!(assembler.buffered(), bytes.len() - 1);
        assert_eq!(assembler.feed(bytes[bytes.len() - 1]), Some(packet));
    }

    #[test]
    fn test_empty_payload() {
        let packet = Packet::version_request().unwrap();
        let mut assembler = PacketAssembler::new();
        assert_eq!(feed_all(&mut assembler, packet.as_bytes()), vec![packet]);
    }

    #[test]
    fn test_concatenated_packets_in_order() {
        let packets: std::vec::Vec<Packet> = (0..5u8)
            .map(|i| Packet::new(i, &vec![i; i as usize * 10]).unwrap())
            .collect();
        let stream: std::vec::Vec<u8> = packets
            .iter()
            .flat_map(|p| p.as_bytes().to_vec())
            .collect();

        let mut assembler = PacketAssembler::new();
        assert_eq!(feed_all(&mut assembler, &stream), packets);
    }

    #[test]
    fn test_skips_leading_garbage() {
        let packet = Packet::new(3, b"data").unwrap();
        let mut stream = vec![0x00, 0xFF, SYNC1, 0x42, SYNC1];
        stream.extend_from_slice(packet.as_bytes());

        let mut assembler = PacketAssembler::new();
        assert_eq!(feed_all(&mut assembler, &stream), vec![packet]);
    }

    #[test]
    fn test_corrupt_packet_is_dropped_and_next_recovered() {
        let bad = Packet::new(9, b"broken").unwrap();
        let mut corrupted = bad.as_bytes().to_vec();
        corrupted[HEADER_SIZE] ^= 0xFF;

        let good = Packet::new(10, b"fine").unwrap();
        let mut stream = corrupted;
        stream.extend_from_slice(good.as_bytes());

        let mut assembler = PacketAssembler::new();
        assert_eq!(feed_all(&mut assembler, &stream), vec![good]);
        assert_eq!(assembler.dropped(), 1);
    }

    #[test]
    fn test_resync_finds_packet_inside_bogus_header() {
        // A stray sync pair whose length byte swallows a real packet.
        let inner = Packet::new(2, b"ok").unwrap();
        let mut stream = vec![SYNC1, SYNC2, 0x01, inner.wire_size() as u8];
        stream.extend_from_slice(inner.as_bytes());
        stream.extend_from_slice(&[0x00, 0x00]);

        let mut assembler = PacketAssembler::new();
        assert_eq!(feed_all(&mut assembler, &stream), vec![inner]);
    }

    #[test]
    fn test_resync_recovers_every_hidden_packet() {
        let hidden = vec![
            Packet::new(1, b"aa").unwrap(),
            Packet::new(2, b"bb").unwrap(),
            Packet::new(3, b"cc").unwrap(),
        ];
        let stream = bogus_frame_around(&hidden);
        let mut assembler = PacketAssembler::new();

        let (last, head) = stream.split_last().unwrap();
        for &b in head {
            assert!(assembler.feed(b).is_none());
        }

        // The byte that fails the bogus frame yields the first hidden packet;
        // the rest wait in the queue.
        assert_eq!(assembler.feed(*last), Some(hidden[0].clone()));
        assert_eq!(assembler.queued(), 2);
        assert_eq!(assembler.poll(), Some(hidden[1].clone()));
        assert_eq!(assembler.poll(), Some(hidden[2].clone()));
        assert_eq!(assembler.poll(), None);
        assert_eq!(assembler.dropped(), 1);
    }

    #[test]
    fn test_queued_packets_come_before_new_ones() {
        let hidden = vec![Packet::new(1, b"aa").unwrap(), Packet::new(2, b"bb").unwrap()];
        let after = Packet::new(4, b"dd").unwrap();
        let mut stream = bogus_frame_around(&hidden);
        stream.extend_from_slice(after.as_bytes());

        // Never poll: feed alone must still hand packets out in stream order.
        let mut assembler = PacketAssembler::new();
        let out: std::vec::Vec<Packet> = stream.iter().filter_map(|&b| assembler.feed(b)).collect();
        assert_eq!(out, vec![hidden[0].clone(), hidden[1].clone(), after]);
        assert_eq!(assembler.poll(), None);
    }

    #[test]
    fn test_reset_discards_partial() {
        let packet = Packet::new(4, b"abcd").unwrap();
        let bytes = packet.as_bytes();
        let mut assembler = PacketAssembler::new();

        feed_all(&mut assembler, &bytes[..5]);
        assert!(assembler.buffered() > 0);
        assembler.reset();
        assert_eq!(assembler.buffered(), 0);
        assert_eq!(assembler.queued(), 0);

        assert_eq!(feed_all(&mut assembler, bytes), vec![packet]);
    }
}
