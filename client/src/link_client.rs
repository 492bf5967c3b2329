use std::time::{Duration, Instant};

use gimbalcomm::{CommConfig, CommSession, Packet, Result};
use log::*;

#[derive(Debug)]
pub enum ClientTarget {
    Serial(String),
    Network(CommConfig),
}

pub struct LinkClient {
    target: ClientTarget,
}

impl LinkClient {
    pub fn new(target: ClientTarget) -> Self {
        Self { target }
    }

    /// Opens the link, asks for the gimbal's version and logs every packet
    /// received for `duration`.
    pub fn run(&mut self, duration: Duration) -> Result<()> {
        info!("Connecting to target: {:?}", self.target);
        let mut session = match &self.target {
            ClientTarget::Serial(path) => {
                let mut session = CommSession::new();
                session.open_serial(path)?;
                info!("Serial port {} open.", path);
                session
            }
            ClientTarget::Network(config) => {
                let mut session = CommSession::with_config(config.clone());
                let peer = session.open_network()?;
                info!("Connected to {}", peer);
                session
            }
        };

        session.send(&Packet::version_request()?)?;

        let start = Instant::now();
        while start.elapsed() < duration {
            if let Some(packet) = session.receive()? {
                info!(
                    "packet id={:#04x} len={} payload={:02x?}",
                    packet.id(),
                    packet.payload_len(),
                    packet.payload()
                );
            }
        }
        session.close();

        let stats = session.stats();
        let elapsed = start.elapsed();
        info!("=== Session Complete ===");
        info!("Packets sent: {}", stats.packets_sent);
        info!("Packets received: {}", stats.packets_received);
        info!("Bytes received: {}", stats.bytes_received);
        info!(
            "Rate: {:.2} packets/s",
            stats.packets_received as f64 / elapsed.as_secs_f64()
        );
        Ok(())
    }
}
