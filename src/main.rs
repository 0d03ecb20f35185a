use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

mod config;
mod device;
mod gw2;
mod session;

use config::Config;
use device::TcpDeviceLink;
use gw2::Gw2Client;
use session::CompanionSession;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let client = Gw2Client::new(
        &config.api_url,
        &config.lang,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    info!("GW2 API client ready ({})", config.api_url);

    let link = TcpDeviceLink::new();
    let (device_tx, device_rx) = mpsc::channel(64);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Device bridge listening on {}", addr);

    tokio::spawn(device::tcp::serve(listener, link.clone(), device_tx));

    // The session owns all match state and blocks until the bridge closes.
    let (session, enrich_rx) = CompanionSession::new(client, Arc::new(link));
    session.run(device_rx, enrich_rx).await;

    Ok(())
}
