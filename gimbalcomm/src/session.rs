//! The caller-facing session.
//!
//! A `CommSession` owns at most one open transport and the framing state
//! for it. Every operation reports success or failure explicitly; calling
//! `send`, `receive` or `close` with nothing open is safe.

use std::net::SocketAddr;

use log::{debug, info, trace, warn};

use crate::config::CommConfig;
use crate::core::{FrameAssembler, Packet, PacketAssembler};
use crate::error::{Error, Result};
use crate::transport::{NetworkLink, SerialLink, Transport};

/// Which kind of transport is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    /// A serial device.
    Serial,
    /// A TCP stream found by discovery.
    Network,
    /// A transport supplied through [`CommSession::attach`].
    Custom,
}

/// Counters for one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Packets fully written.
    pub packets_sent: u64,
    /// Packets assembled from the stream.
    pub packets_received: u64,
    /// Bytes written.
    pub bytes_sent: u64,
    /// Bytes read.
    pub bytes_received: u64,
    /// Reads that failed with something other than a timeout.
    pub read_errors: u64,
}

/// A connection to one gimbal.
///
/// # Example
///
/// ```rust,no_run
/// use gimbalcomm::{CommSession, Packet};
///
/// let mut session = CommSession::new();
/// session.open_serial("/dev/ttyUSB0")?;
/// session.send(&Packet::version_request()?)?;
///
/// loop {
///     if let Some(packet) = session.receive()? {
///         println!("packet {:#04x}: {:?}", packet.id(), packet.payload());
///     }
/// }
/// # Ok::<(), gimbalcomm::Error>(())
/// ```
pub struct CommSession<A = PacketAssembler> {
    config: CommConfig,
    link: Option<Box<dyn Transport + Send>>,
    medium: Option<Medium>,
    peer: Option<SocketAddr>,
    assembler: A,
    stats: SessionStats,
}

impl CommSession<PacketAssembler> {
    /// Creates a closed session using the firmware's fixed parameters.
    pub fn new() -> Self {
        Self::with_config(CommConfig::default())
    }

    /// Creates a closed session with custom link parameters.
    pub fn with_config(config: CommConfig) -> Self {
        Self::with_assembler(config, PacketAssembler::new())
    }
}

impl Default for CommSession<PacketAssembler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: FrameAssembler> CommSession<A> {
    /// Creates a closed session that frames incoming bytes with `assembler`.
    pub fn with_assembler(config: CommConfig, assembler: A) -> Self {
        Self {
            config,
            link: None,
            medium: None,
            peer: None,
            assembler,
            stats: SessionStats::default(),
        }
    }

    /// Link parameters.
    pub fn config(&self) -> &CommConfig {
        &self.config
    }

    /// Opens a serial device. On success it replaces any open transport;
    /// on failure the current one is left as it was.
    pub fn open_serial(&mut self, path: &str) -> Result<()> {
        let link = SerialLink::open(path, &self.config)?;
        self.install(Box::new(link), Medium::Serial, None);
        Ok(())
    }

    /// Discovers a device on the local network and connects to it.
    ///
    /// Blocks for up to `probe_attempts` read timeouts while probing.
    /// Returns the address of the device's stream server.
    pub fn open_network(&mut self) -> Result<SocketAddr> {
        let link = NetworkLink::open(&self.config)?;
        let peer = link.peer();
        self.install(Box::new(link), Medium::Network, Some(peer));
        Ok(peer)
    }

    /// Uses an already open transport.
    pub fn attach<T: Transport + Send + 'static>(&mut self, transport: T) {
        self.install(Box::new(transport), Medium::Custom, None);
    }

    fn install(
        &mut self,
        link: Box<dyn Transport + Send>,
        medium: Medium,
        peer: Option<SocketAddr>,
    ) {
        if let Some(previous) = self.medium {
            info!("replacing open {:?} transport with {:?}", previous, medium);
        }
        self.link = Some(link);
        self.medium = Some(medium);
        self.peer = peer;
        self.assembler.reset();
        debug!("{:?} transport active", medium);
    }

    /// Closes the open transport, if any.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            info!("closed {:?} transport", self.medium);
        }
        self.medium = None;
        self.peer = None;
        self.assembler.reset();
    }

    /// Returns true while a transport is open.
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Kind of transport open, if any.
    pub fn medium(&self) -> Option<Medium> {
        self.medium
    }

    /// Device stream address when the network transport is open.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Session counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// The framing state, e.g. to read [`PacketAssembler::dropped`].
    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    /// Writes a whole packet. Succeeds only if every byte was accepted.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        let bytes = packet.as_bytes();
        link.write_all(bytes)?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;
        trace!("sent packet id={:#04x} len={}", packet.id(), packet.payload_len());
        Ok(())
    }

    /// Reads bytes one at a time until a packet completes or no more data
    /// is available.
    ///
    /// Returns `Ok(None)` once a read times out; any partial packet is kept
    /// for the next call. Returns the first completed packet immediately,
    /// leaving later bytes unread. Packets the assembler already holds are
    /// returned before anything more is read.
    pub fn receive(&mut self) -> Result<Option<Packet>> {
        let link = self.link.as_mut().ok_or(Error::NotOpen)?;
        if let Some(packet) = self.assembler.poll() {
            self.stats.packets_received += 1;
            return Ok(Some(packet));
        }
        let mut byte = [0u8; 1];

        loop {
            match link.read(&mut byte) {
                Ok(0) => {
                    warn!("{:?} transport closed by peer", self.medium);
                    return Err(Error::Disconnected);
                }
                Ok(_) => {
                    self.stats.bytes_received += 1;
                    if let Some(packet) = self.assembler.feed(byte[0]) {
                        self.stats.packets_received += 1;
                        trace!(
                            "received packet id={:#04x} len={}",
                            packet.id(),
                            packet.payload_len()
                        );
                        return Ok(Some(packet));
                    }
                }
                Err(Error::WouldBlock) => return Ok(None),
                Err(e) => {
                    self.stats.read_errors += 1;
                    debug!("read failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
