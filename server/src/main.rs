use std::net::{Ipv4Addr, SocketAddr};

use log::{error, info};

mod sim_server;

use sim_server::SimServer;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let probe_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, gimbalcomm::UDP_REQUEST_PORT));
    let stream_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, gimbalcomm::TCP_PORT));

    info!("Starting simulated gimbal...");
    let server = SimServer::new(probe_addr, stream_addr);
    if let Err(e) = server.run().await {
        error!("Simulator stopped: {}", e);
        std::process::exit(1);
    }
}
