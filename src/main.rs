//! postd - social image post pipeline daemon

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use postd::{Config, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Social image post pipeline daemon
#[derive(Parser, Debug)]
#[command(name = "postd", version, about = "Generate an AI image and publish it as a social post")]
struct Args {
    /// Address to bind
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Staging directory for generated images
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postd=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.staging_dir {
        config.staging_dir = dir;
    }

    let server = Server::new(config).await?;
    server.run().await
}
