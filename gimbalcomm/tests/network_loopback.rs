//! End-to-end discovery and streaming over loopback sockets.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use gimbalcomm::{CommConfig, CommSession, Error, Medium, Packet};

/// A UDP responder that answers the `reply_on`-th probe it sees.
fn spawn_responder(reply_on: u32) -> (u16, thread::JoinHandle<Vec<u8>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = socket.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 512];
        let mut seen = 0;
        loop {
            let (n, from) = socket.recv_from(&mut buf).unwrap();
            seen += 1;
            if seen == reply_on {
                socket.send_to(b"gimbal", from).unwrap();
                return buf[..n].to_vec();
            }
        }
    });

    (port, handle)
}

fn loopback_config(request_port: u16, tcp_port: u16) -> CommConfig {
    CommConfig::new()
        .with_udp_ports(request_port, 0)
        .with_tcp_ports(tcp_port, 0)
        .with_broadcast_addr(Ipv4Addr::LOCALHOST)
        .with_connect_timeout(Duration::from_secs(2))
}

#[test]
fn test_discover_connect_and_exchange() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let tcp_port = listener.local_addr().unwrap().port();
    let (request_port, responder) = spawn_responder(3);

    let mut session = CommSession::with_config(loopback_config(request_port, tcp_port));
    let peer = session.open_network().unwrap();

    assert_eq!(peer, SocketAddr::from(([127, 0, 0, 1], tcp_port)));
    assert_eq!(session.medium(), Some(Medium::Network));
    assert_eq!(session.peer(), Some(peer));

    let probe = responder.join().unwrap();
    assert_eq!(probe, Packet::version_request().unwrap().as_bytes());

    let (mut device, _) = listener.accept().unwrap();
    device
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    // Device to host: two packets in one write.
    let status = Packet::new(0x10, b"status").unwrap();
    let angles = Packet::new(0x11, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let mut burst = status.as_bytes().to_vec();
    burst.extend_from_slice(angles.as_bytes());
    device.write_all(&burst).unwrap();

    assert_eq!(session.receive().unwrap(), Some(status));
    assert_eq!(session.receive().unwrap(), Some(angles));
    assert_eq!(session.receive().unwrap(), None);

    // Host to device.
    let command = Packet::new(0x20, b"move").unwrap();
    session.send(&command).unwrap();
    let mut received = vec![0u8; command.wire_size()];
    device.read_exact(&mut received).unwrap();
    assert_eq!(received, command.as_bytes());

    drop(device);
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match session.receive() {
            Err(Error::Disconnected) => break,
            Ok(None) if Instant::now() < deadline => continue,
            other => panic!("expected disconnect, got {:?}", other),
        }
    }

    session.close();
    assert!(!session.is_open());
}

#[test]
fn test_split_packet_over_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let tcp_port = listener.local_addr().unwrap().port();
    let (request_port, _responder) = spawn_responder(1);

    let mut session = CommSession::with_config(loopback_config(request_port, tcp_port));
    session.open_network().unwrap();
    let (mut device, _) = listener.accept().unwrap();

    let packet = Packet::new(0x30, b"arrives in two parts").unwrap();
    let (head, tail) = packet.as_bytes().split_at(9);

    device.write_all(head).unwrap();
    assert_eq!(session.receive().unwrap(), None);

    device.write_all(tail).unwrap();
    assert_eq!(session.receive().unwrap(), Some(packet));
}

#[test]
fn test_receive_returns_promptly_when_idle() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let tcp_port = listener.local_addr().unwrap().port();
    let (request_port, _responder) = spawn_responder(1);

    let mut session = CommSession::with_config(loopback_config(request_port, tcp_port));
    session.open_network().unwrap();
    let (_device, _) = listener.accept().unwrap();

    let start = Instant::now();
    assert_eq!(session.receive().unwrap(), None);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_silent_network_times_out() {
    // Bound but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let request_port = silent.local_addr().unwrap().port();

    let config = loopback_config(request_port, 9).with_probe_attempts(3);
    let mut session = CommSession::with_config(config);

    let start = Instant::now();
    let err = session.open_network().unwrap_err();
    assert!(matches!(err, Error::DiscoveryTimeout { attempts: 3 }));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!session.is_open());
}
