use std::net::SocketAddr;

use gimbalcomm::core::VERSION_REQUEST_ID;
use gimbalcomm::{FrameAssembler, Packet, PacketAssembler};
use log::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

const VERSION_STRING: &[u8] = b"gimbal-sim 0.1.0";

/// A stand-in for a networked gimbal: answers discovery probes and echoes
/// framed packets back over TCP.
pub struct SimServer {
    probe_addr: SocketAddr,
    stream_addr: SocketAddr,
}

impl SimServer {
    pub fn new(probe_addr: SocketAddr, stream_addr: SocketAddr) -> Self {
        Self {
            probe_addr,
            stream_addr,
        }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let udp = UdpSocket::bind(self.probe_addr).await?;
        info!("Answering discovery probes on {:?}", self.probe_addr);
        tokio::spawn(Self::answer_probes(udp));

        let listener = TcpListener::bind(self.stream_addr).await?;
        info!("Server listening on TCP {:?}", self.stream_addr);
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept: {}", e);
                    continue;
                }
            };
            info!("Accepted TCP connection from {:?}", peer);
            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream).await {
                    error!("Connection error: {}", e);
                }
            });
        }
    }

    /// Replies to every datagram so the sender learns our address.
    async fn answer_probes(socket: UdpSocket) {
        let mut buf = [0u8; 512];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    debug!("Probe of {} bytes from {}", n, from);
                    if let Err(e) = socket.send_to(VERSION_STRING, from).await {
                        warn!("Failed to answer probe from {}: {}", from, e);
                    }
                }
                Err(e) => {
                    error!("Probe socket error: {}", e);
                    break;
                }
            }
        }
    }

    async fn handle_connection(mut stream: TcpStream) -> std::io::Result<()> {
        let mut assembler = PacketAssembler::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                info!("Connection closed by remote");
                return Ok(());
            }

            for &byte in &buf[..n] {
                let mut next = assembler.feed(byte);
                while let Some(packet) = next {
                    debug!("Packet id={:#04x} len={}", packet.id(), packet.payload_len());
                    let reply = Self::reply_to(&packet)?;
                    stream.write_all(reply.as_bytes()).await?;
                    next = assembler.poll();
                }
            }
        }
    }

    /// Version requests get the simulator's version string; anything else
    /// is echoed.
    fn reply_to(packet: &Packet) -> gimbalcomm::Result<Packet> {
        if packet.id() == VERSION_REQUEST_ID {
            Packet::new(VERSION_REQUEST_ID, VERSION_STRING)
        } else {
            Ok(packet.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_request_gets_version() {
        let reply = SimServer::reply_to(&Packet::version_request().unwrap()).unwrap();
        assert_eq!(reply.id(), VERSION_REQUEST_ID);
        assert_eq!(reply.payload(), VERSION_STRING);
    }

    #[test]
    fn test_other_packets_are_echoed() {
        let packet = Packet::new(0x55, b"echo").unwrap();
        assert_eq!(SimServer::reply_to(&packet).unwrap(), packet);
    }

    #[tokio::test]
    async fn test_connection_echoes_framed_packets() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            SimServer::handle_connection(stream).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let packet = Packet::new(0x42, b"hello").unwrap();
        client.write_all(packet.as_bytes()).await.unwrap();

        let mut reply = vec![0u8; packet.wire_size()];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, packet.as_bytes());
    }
}
