use std::net::Ipv4Addr;
use std::time::Duration;

use gimbalcomm::CommConfig;
use log::error;

mod link_client;

use link_client::{ClientTarget, LinkClient};

const POLL_DURATION: Duration = Duration::from_secs(10);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // gimbal-client                 discover a gimbal on the LAN
    // gimbal-client --loopback      discover gimbal-sim on this host
    // gimbal-client /dev/ttyUSB0    talk over a serial line
    let target = match std::env::args().nth(1).as_deref() {
        None => ClientTarget::Network(CommConfig::default()),
        Some("--loopback") => ClientTarget::Network(
            CommConfig::default()
                .with_broadcast_addr(Ipv4Addr::LOCALHOST)
                .with_tcp_ports(gimbalcomm::TCP_PORT, 0),
        ),
        Some(path) => ClientTarget::Serial(path.to_string()),
    };

    let mut client = LinkClient::new(target);
    if let Err(e) = client.run(POLL_DURATION) {
        error!("{}", e);
        std::process::exit(1);
    }
}
