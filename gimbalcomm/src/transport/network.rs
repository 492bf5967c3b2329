//! Network transport: UDP broadcast discovery followed by a TCP stream.
//!
//! The device's address is not known in advance, so the link first
//! broadcasts probes and takes the source of the first reply as the
//! device address. It then opens a TCP connection to that address and
//! drops the UDP socket.
//!
//! ```text
//!   Idle ──bind──▶ Probing ──reply──▶ Discovered ──connect──▶ Connected
//!                     │
//!                     └──attempts exhausted──▶ Failed
//! ```
//!
//! [`Discovery`] tracks the first three states through [`DiscoveryState`];
//! the Connected state is a [`NetworkLink`] value.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream, UdpSocket};

use log::{debug, info, trace, warn};
use socket2::{Domain, Protocol, Socket, Type};

use super::Transport;
use crate::config::CommConfig;
use crate::core::Packet;
use crate::error::{Error, Result};

/// Size of the buffer probe replies are read into.
const REPLY_BUF_SIZE: usize = 64;

/// The datagram operations discovery needs.
///
/// Implemented for [`UdpSocket`]; tests substitute a scripted responder.
pub trait ProbeSocket {
    /// Sends one probe datagram.
    fn send_probe(&self, probe: &[u8], to: SocketAddr) -> io::Result<usize>;

    /// Waits up to the socket's read timeout for one reply.
    fn recv_reply(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl ProbeSocket for UdpSocket {
    fn send_probe(&self, probe: &[u8], to: SocketAddr) -> io::Result<usize> {
        self.send_to(probe, to)
    }

    fn recv_reply(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf)
    }
}

/// Address of a device that answered discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteEndpoint {
    addr: SocketAddr,
}

impl RemoteEndpoint {
    /// Wraps the source address of a probe reply.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Source address of the reply.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Device IP address.
    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Address of the device's stream server.
    pub fn stream_addr(&self, tcp_port: u16) -> SocketAddr {
        SocketAddr::new(self.addr.ip(), tcp_port)
    }
}

/// Progress of a discovery run.
///
/// There is no connected variant: a successful [`NetworkLink::connect`]
/// consumes the discovery socket, and the returned [`NetworkLink`] is the
/// connected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Not started.
    Idle,
    /// Sending probe number `attempt` (1-based).
    Probing {
        /// Current attempt.
        attempt: u32,
    },
    /// A device answered.
    Discovered(RemoteEndpoint),
    /// Every attempt went unanswered.
    Failed,
}

/// Bounded broadcast-probe loop.
pub struct Discovery<S> {
    socket: S,
    target: SocketAddr,
    max_attempts: u32,
    probe: Packet,
    probes_sent: u32,
    state: DiscoveryState,
}

impl<S: ProbeSocket> Discovery<S> {
    /// Prepares discovery over `socket` using the ports and bound from
    /// `config`.
    pub fn new(socket: S, config: &CommConfig) -> Result<Self> {
        Ok(Self {
            socket,
            target: SocketAddr::V4(SocketAddrV4::new(
                config.broadcast_addr,
                config.udp_request_port,
            )),
            max_attempts: config.probe_attempts,
            probe: Packet::version_request()?,
            probes_sent: 0,
            state: DiscoveryState::Idle,
        })
    }

    /// Current state.
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Probes sent so far.
    pub fn probes_sent(&self) -> u32 {
        self.probes_sent
    }

    /// The underlying socket.
    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Consumes the discovery, returning the socket.
    pub fn into_socket(self) -> S {
        self.socket
    }

    /// Probes until a device answers or the attempt bound is reached.
    ///
    /// Blocks for at most `attempts` read timeouts.
    pub fn run(&mut self) -> Result<RemoteEndpoint> {
        let mut buf = [0u8; REPLY_BUF_SIZE];

        for attempt in 1..=self.max_attempts {
            self.state = DiscoveryState::Probing { attempt };
            self.probes_sent += 1;

            if let Err(e) = self.socket.send_probe(self.probe.as_bytes(), self.target) {
                debug!("probe {} to {} not sent: {}", attempt, self.target, e);
            }

            match self.socket.recv_reply(&mut buf) {
                Ok((n, from)) if n > 0 => {
                    let endpoint = RemoteEndpoint::new(from);
                    info!("device answered probe {} from {}", attempt, from);
                    self.state = DiscoveryState::Discovered(endpoint);
                    return Ok(endpoint);
                }
                Ok(_) => trace!("probe {}: empty reply ignored", attempt),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    trace!("probe {}: no reply", attempt)
                }
                Err(e) => debug!("probe {}: receive failed: {}", attempt, e),
            }
        }

        warn!(
            "no device answered {} probes to {}",
            self.max_attempts, self.target
        );
        self.state = DiscoveryState::Failed;
        Err(Error::DiscoveryTimeout {
            attempts: self.max_attempts,
        })
    }
}

/// Binds the UDP socket probe replies arrive on.
///
/// Timeout and broadcast options are best effort; a failure to bind is not.
pub fn bind_discovery_socket(config: &CommConfig) -> Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.udp_reply_port)).map_err(
        |source| Error::Bind {
            socket: "udp",
            port: config.udp_reply_port,
            source,
        },
    )?;

    if let Err(e) = socket.set_read_timeout(Some(config.read_timeout)) {
        warn!("unable to set UDP socket timeout: {}", e);
    }
    if let Err(e) = socket.set_broadcast(true) {
        warn!("unable to enable UDP broadcast: {}", e);
    }

    Ok(socket)
}

/// A TCP stream to a discovered device.
#[derive(Debug)]
pub struct NetworkLink {
    stream: TcpStream,
    peer: SocketAddr,
}

impl NetworkLink {
    /// Discovers a device and connects to it.
    pub fn open(config: &CommConfig) -> Result<Self> {
        let socket = bind_discovery_socket(config)?;
        let mut discovery = Discovery::new(socket, config)?;
        let endpoint = discovery.run()?;
        Self::connect(endpoint, discovery.into_socket(), config)
    }

    /// Opens the stream to `endpoint`. The discovery socket is closed once
    /// the stream socket exists, whether or not the connect succeeds.
    pub fn connect(endpoint: RemoteEndpoint, udp: UdpSocket, config: &CommConfig) -> Result<Self> {
        let target = endpoint.stream_addr(config.tcp_port);
        let socket = Socket::new(Domain::for_address(target), Type::STREAM, Some(Protocol::TCP))?;
        drop(udp);

        if let Err(e) = socket.set_read_timeout(Some(config.read_timeout)) {
            warn!("unable to set TCP socket timeout: {}", e);
        }
        if let Err(e) = socket.set_reuse_address(true) {
            warn!("unable to set SO_REUSEADDR on TCP socket: {}", e);
        }

        let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.tcp_local_port);
        socket.bind(&local.into()).map_err(|source| Error::Bind {
            socket: "tcp",
            port: config.tcp_local_port,
            source,
        })?;

        debug!("connecting to {}", target);
        let connected = match config.connect_timeout {
            Some(timeout) => socket.connect_timeout(&target.into(), timeout),
            None => socket.connect(&target.into()),
        };
        connected.map_err(|source| Error::Connect {
            addr: target,
            source,
        })?;

        info!("connected to {}", target);
        Ok(Self {
            stream: socket.into(),
            peer: target,
        })
    }

    /// Address of the device's stream server.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of the stream.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }
}

impl Drop for NetworkLink {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Transport for NetworkLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from_io)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from_io)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush().map_err(Error::from_io)
    }
}
