// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use websocktunnel_client::{config::Settings, connection::WsConnector, reconnect::Reconnector};

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Connects to a websocktunnel relay and reports the public URL it assigns.
#[derive(Parser, Debug)]
#[command(name = "websocktunnel-probe")]
#[command(about = "Websocktunnel relay probe", version)]
struct Args {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit right after the connection is established.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "websocktunnel_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config)?;

    tracing::info!("Starting websocktunnel probe");
    tracing::info!("Client ID: {}", settings.client.id);
    tracing::info!("Relay: {}", settings.relay.address);

    let reconnector = Reconnector::new(Arc::new(settings), WsConnector).await?;
    let mut dialed = reconnector.connect_with_retry().await?;

    println!("{}", dialed.url);

    if !args.once {
        tracing::info!("Holding tunnel open, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
    }

    if let Err(e) = dialed.conn.close(None).await {
        tracing::debug!(error = %e, "error closing relay connection");
    }
    Ok(())
}
