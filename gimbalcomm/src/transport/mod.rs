//! Transport layer abstraction.
//!
//! This module provides the `Transport` trait that the session uses to
//! move raw bytes, whatever the physical medium.
//!
//! # Implementations
//!
//! - `SerialLink`: a serial device at the fixed gimbal line settings
//! - `NetworkLink`: a TCP stream found by UDP broadcast discovery
//! - `StdTransport`: wraps any `std::io` Read/Write type
//! - `MemoryTransport`: scripted in-memory transport for tests
//!
//! # Example
//!
//! ```rust
//! use gimbalcomm::transport::{MemoryTransport, Transport};
//!
//! let mut transport = MemoryTransport::new();
//! transport.push_incoming(b"Hello");
//!
//! let mut buf = [0u8; 32];
//! let n = transport.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"Hello");
//! ```

pub mod network;
pub mod serial;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

pub use network::NetworkLink;
pub use serial::SerialLink;

/// Byte pipe to the device.
pub trait Transport {
    /// Reads bytes into the buffer.
    ///
    /// Returns `Error::WouldBlock` when no data arrived within the read
    /// timeout, and `Ok(0)` when the peer has closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes bytes from the buffer, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flushes any buffered data.
    fn flush(&mut self) -> Result<()>;

    /// Writes all bytes, retrying partial writes until complete.
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            match self.write(&buf[written..]) {
                Ok(0) => {
                    return Err(Error::WriteZero {
                        written,
                        expected: buf.len(),
                    });
                }
                Ok(n) => written += n,
                Err(e) => return Err(e),
            }
        }
        self.flush()
    }
}

/// Wrapper for std::io types.
#[derive(Debug)]
pub struct StdTransport<T> {
    inner: T,
}

impl<T> StdTransport<T> {
    /// Creates a new StdTransport wrapping the given type.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Returns a reference to the inner type.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Consumes the wrapper and returns the inner type.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: std::io::Read + std::io::Write> Transport for StdTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        std::io::Read::read(&mut self.inner, buf).map_err(Error::from_io)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        std::io::Write::write(&mut self.inner, buf).map_err(Error::from_io)
    }

    fn flush(&mut self) -> Result<()> {
        std::io::Write::flush(&mut self.inner).map_err(Error::from_io)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    incoming: VecDeque<u8>,
    outgoing: Vec<u8>,
    max_write: Option<usize>,
    accept_limit: Option<usize>,
    closed: bool,
}

/// In-memory transport whose handles share one state.
///
/// Clone it before handing it to a session to keep a handle for feeding
/// incoming bytes and inspecting what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues bytes to be returned by later reads.
    pub fn push_incoming(&self, data: &[u8]) {
        self.lock().incoming.extend(data);
    }

    /// Number of queued bytes not yet read.
    pub fn pending(&self) -> usize {
        self.lock().incoming.len()
    }

    /// Drains everything written so far.
    pub fn take_outgoing(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().outgoing)
    }

    /// Caps each write call at `n` bytes.
    pub fn set_max_write(&self, n: usize) {
        self.lock().max_write = Some(n);
    }

    /// Stops accepting bytes once `n` bytes in total have been written.
    pub fn set_accept_limit(&self, n: usize) {
        self.lock().accept_limit = Some(n);
    }

    /// Makes reads report end of stream once the queue is empty.
    pub fn close_remote(&self) {
        self.lock().closed = true;
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        if state.incoming.is_empty() {
            return if state.closed { Ok(0) } else { Err(Error::WouldBlock) };
        }
        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        let mut n = buf.len();
        if let Some(max) = state.max_write {
            n = n.min(max);
        }
        if let Some(limit) = state.accept_limit {
            n = n.min(limit.saturating_sub(state.outgoing.len()));
        }
        state.outgoing.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut transport = MemoryTransport::new();
        let handle = transport.clone();

        let mut buf = [0u8; 8];
        assert!(matches!(transport.read(&mut buf), Err(Error::WouldBlock)));

        handle.push_incoming(b"ping");
        assert_eq!(transport.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");

        transport.write_all(b"pong").unwrap();
        assert_eq!(handle.take_outgoing(), b"pong");
    }

    #[test]
    fn test_write_all_loops_over_partial_writes() {
        let mut transport = MemoryTransport::new();
        transport.set_max_write(3);

        transport.write_all(b"0123456789").unwrap();
        assert_eq!(transport.take_outgoing(), b"0123456789");
    }

    #[test]
    fn test_write_all_reports_stall() {
        let mut transport = MemoryTransport::new();
        transport.set_accept_limit(4);

        let err = transport.write_all(b"0123456789").unwrap_err();
        assert!(matches!(
            err,
            Error::WriteZero {
                written: 4,
                expected: 10
            }
        ));
    }

    #[test]
    fn test_closed_remote_reads_zero() {
        let mut transport = MemoryTransport::new();
        transport.close_remote();
        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_std_transport() {
        let cursor = std::io::Cursor::new(b"abc".to_vec());
        let mut transport = StdTransport::new(cursor);

        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(transport.into_inner().position(), 2);
    }
}
