//! Custom transport implementation example.
//!
//! Shows how to attach your own `Transport` to a `CommSession`: here an
//! in-process simulated gimbal, optionally behind a line that corrupts
//! bytes so the assembler's resynchronization can be seen.
//!
//! Run with: cargo run --example custom_transport

use std::collections::VecDeque;

use gimbalcomm::core::VERSION_REQUEST_ID;
use gimbalcomm::error::{Error, Result};
use gimbalcomm::transport::Transport;
use gimbalcomm::{CommConfig, CommSession, FrameAssembler, Packet, PacketAssembler};

/// A gimbal living in memory. Packets written to it are parsed and
/// answered: version requests with a version string, anything else echoed.
pub struct SimulatedGimbal {
    assembler: PacketAssembler,
    replies: VecDeque<u8>,
}

impl SimulatedGimbal {
    pub fn new() -> Self {
        Self {
            assembler: PacketAssembler::new(),
            replies: VecDeque::new(),
        }
    }

    fn answer(&mut self, request: Packet) -> Result<()> {
        let reply = if request.id() == VERSION_REQUEST_ID {
            Packet::new(VERSION_REQUEST_ID, b"simulated 1.0")?
        } else {
            request
        };
        self.replies.extend(reply.as_bytes());
        Ok(())
    }
}

impl Transport for SimulatedGimbal {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.replies.is_empty() {
            return Err(Error::WouldBlock);
        }
        let n = buf.len().min(self.replies.len());
        for (slot, byte) in buf.iter_mut().zip(self.replies.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        for &byte in buf {
            let mut next = self.assembler.feed(byte);
            while let Some(request) = next {
                self.answer(request)?;
                next = self.assembler.poll();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Flips every `period`-th byte coming from the device. A period of 0
/// leaves the line clean.
pub struct NoisyLine<T> {
    inner: T,
    period: u32,
    reads: u32,
}

impl<T: Transport> NoisyLine<T> {
    pub fn new(inner: T, period: u32) -> Self {
        Self {
            inner,
            period,
            reads: 0,
        }
    }
}

impl<T: Transport> Transport for NoisyLine<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.reads += n as u32;
        if n > 0 && self.reads.checked_rem(self.period) == Some(0) {
            buf[0] ^= 0x5A;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

fn exchange<A: FrameAssembler>(session: &mut CommSession<A>, packet: &Packet) -> Result<()> {
    session.send(packet)?;
    match session.receive()? {
        Some(reply) => println!(
            "   sent {:#04x}, got {:#04x} {:?}",
            packet.id(),
            reply.id(),
            String::from_utf8_lossy(reply.payload())
        ),
        None => println!("   sent {:#04x}, reply lost", packet.id()),
    }
    Ok(())
}

fn main() -> Result<()> {
    println!("=== gimbalcomm Custom Transport Example ===\n");

    println!("1. Clean simulated gimbal:");
    let mut session = CommSession::new();
    session.attach(SimulatedGimbal::new());
    println!("   medium: {:?}", session.medium());

    exchange(&mut session, &Packet::version_request()?)?;
    exchange(&mut session, &Packet::new(0x20, b"pan 30")?)?;
    exchange(&mut session, &Packet::new(0x21, b"tilt -10")?)?;

    let stats = session.stats();
    println!(
        "   packets sent: {}, received: {}, bytes: {} out / {} in\n",
        stats.packets_sent, stats.packets_received, stats.bytes_sent, stats.bytes_received
    );
    session.close();

    println!("2. Same gimbal behind a noisy line:");
    let mut session = CommSession::with_config(CommConfig::default());
    session.attach(NoisyLine::new(SimulatedGimbal::new(), 10));

    for i in 0..5u8 {
        exchange(&mut session, &Packet::new(0x30 + i, format!("step {}", i).as_bytes())?)?;
    }
    println!(
        "   packets received: {} of 5",
        session.stats().packets_received
    );
    session.close();

    println!("\n=== Custom Transport Example Complete ===");
    Ok(())
}
