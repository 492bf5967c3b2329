//! Error types for the gimbal link.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors reported by transports and the session.
#[derive(Debug, Error)]
pub enum Error {
    /// The path is not a serial device, or its line attributes could not be
    /// read or applied.
    #[error("cannot configure serial device {path}: {reason}")]
    Configuration {
        /// Device path passed to open.
        path: String,
        /// Reason reported by the serial driver.
        reason: String,
    },

    /// No device answered the broadcast probes.
    #[error("no device answered {attempts} discovery probes")]
    DiscoveryTimeout {
        /// Number of probes sent before giving up.
        attempts: u32,
    },

    /// A socket could not be bound to its well-known local port.
    #[error("failed to bind {socket} socket to port {port}: {source}")]
    Bind {
        /// Which socket failed ("udp" or "tcp").
        socket: &'static str,
        /// Local port requested.
        port: u16,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The TCP connection to the discovered device failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Connect target.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Send or receive was called with no transport open.
    #[error("no transport is open")]
    NotOpen,

    /// No data is available right now.
    #[error("operation would block")]
    WouldBlock,

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    Disconnected,

    /// The transport stopped accepting bytes part way through a write.
    #[error("short write: {written} of {expected} bytes accepted")]
    WriteZero {
        /// Bytes accepted before the transport stalled.
        written: usize,
        /// Bytes that should have been written.
        expected: usize,
    },

    /// Payload exceeds what the length byte can declare.
    #[error("payload of {0} bytes exceeds the packet limit")]
    PayloadTooLarge(usize),

    /// Any other I/O failure on an established handle.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Maps an I/O error from a read or write, folding timeouts into
    /// [`Error::WouldBlock`].
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::WouldBlock,
            _ => Error::Io(err),
        }
    }

    /// Returns true for the transient "no data yet" condition.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::WouldBlock)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match &err {
            Error::WouldBlock => io::ErrorKind::WouldBlock,
            Error::Disconnected => io::ErrorKind::UnexpectedEof,
            Error::WriteZero { .. } => io::ErrorKind::WriteZero,
            Error::NotOpen => io::ErrorKind::NotConnected,
            Error::DiscoveryTimeout { .. } => io::ErrorKind::TimedOut,
            Error::Connect { source, .. } | Error::Bind { source, .. } => source.kind(),
            Error::Io(inner) => inner.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
