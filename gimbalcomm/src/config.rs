use std::net::Ipv4Addr;
use std::time::Duration;

use crate::{
    DEFAULT_BAUD_RATE, DEFAULT_PROBE_ATTEMPTS, DEFAULT_READ_TIMEOUT_MS, TCP_PORT,
    UDP_REPLY_PORT, UDP_REQUEST_PORT,
};

/// Link parameters shared by the serial and network transports.
///
/// `CommConfig::default()` matches the gimbal firmware; the `with_*`
/// setters exist for simulators and loopback tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommConfig {
    /// Serial line rate.
    pub baud_rate: u32,
    /// Upper bound on a single blocking read.
    pub read_timeout: Duration,
    /// Number of broadcast probes before discovery gives up.
    pub probe_attempts: u32,
    /// Port the device listens on for probes.
    pub udp_request_port: u16,
    /// Local port probe replies arrive on.
    pub udp_reply_port: u16,
    /// Port of the device's stream server.
    pub tcp_port: u16,
    /// Local port the stream socket binds to before connecting.
    pub tcp_local_port: u16,
    /// Destination address for probes.
    pub broadcast_addr: Ipv4Addr,
    /// Bound on the TCP connect; `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
}

impl CommConfig {
    pub fn new() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            udp_request_port: UDP_REQUEST_PORT,
            udp_reply_port: UDP_REPLY_PORT,
            tcp_port: TCP_PORT,
            tcp_local_port: TCP_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
            connect_timeout: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_probe_attempts(mut self, attempts: u32) -> Self {
        self.probe_attempts = attempts;
        self
    }

    pub fn with_udp_ports(mut self, request_port: u16, reply_port: u16) -> Self {
        self.udp_request_port = request_port;
        self.udp_reply_port = reply_port;
        self
    }

    /// Sets the remote stream port and the local port bound before connect.
    /// A local port of 0 lets the OS pick one.
    pub fn with_tcp_ports(mut self, remote_port: u16, local_port: u16) -> Self {
        self.tcp_port = remote_port;
        self.tcp_local_port = local_port;
        self
    }

    pub fn with_broadcast_addr(mut self, addr: Ipv4Addr) -> Self {
        self.broadcast_addr = addr;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl Default for CommConfig {
    fn default() -> Self {
        Self::new()
    }
}
