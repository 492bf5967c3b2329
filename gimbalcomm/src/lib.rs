//! # gimbalcomm - Serial and Network Link to a Gimbal
//!
//! gimbalcomm opens a byte stream to a single gimbal and turns that stream
//! into packets:
//!
//! - **Serial transport**: a local serial device at a fixed 115200 8N1
//! - **Network transport**: UDP broadcast discovery, then a TCP stream
//! - **Framing**: byte-at-a-time packet assembly with CRC-16 validation and
//!   resynchronization after corrupt input
//! - **Custom transport support**: any type implementing `Transport`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Packet Protocol (caller)                │
//! ├─────────────────────────────────────────────────────────┤
//! │                      CommSession                         │
//! │  ┌─────────────────────┐   ┌─────────────────────────┐  │
//! │  │  open / close       │   │  send / receive         │  │
//! │  └─────────────────────┘   └─────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │                     Frame Layer                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐    │
//! │  │  Assembler  │ │  Checksum   │ │     Packet      │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘    │
//! ├─────────────────────────────────────────────────────────┤
//! │                   Transport Layer                        │
//! │  ┌──────────────┐ ┌─────────────────────┐ ┌──────────┐  │
//! │  │  SerialLink  │ │ NetworkLink (UDP ▶  │ │  Custom  │  │
//! │  │              │ │ discovery, TCP)     │ │          │  │
//! │  └──────────────┘ └─────────────────────┘ └──────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use gimbalcomm::{CommSession, Packet};
//!
//! let mut session = CommSession::new();
//! let peer = session.open_network()?;
//! println!("connected to {}", peer);
//!
//! session.send(&Packet::version_request()?)?;
//! while let Some(packet) = session.receive()? {
//!     println!("got packet {:#04x}", packet.id());
//! }
//! # Ok::<(), gimbalcomm::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod error;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::CommConfig;
pub use self::core::{Crc16, FrameAssembler, Packet, PacketAssembler, PACKET_OVERHEAD};
pub use error::{Error, Result};
pub use session::{CommSession, Medium, SessionStats};
pub use transport::Transport;

/// Port the device listens on for discovery probes.
pub const UDP_REQUEST_PORT: u16 = 8745;

/// Local port discovery replies arrive on.
pub const UDP_REPLY_PORT: u16 = 8746;

/// Port of the device's stream server.
pub const TCP_PORT: u16 = 8747;

/// Fixed serial line rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout for serial and network reads, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Broadcast probes sent before discovery gives up.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 50;
