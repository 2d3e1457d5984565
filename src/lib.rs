//! postd - social image post pipeline daemon
//!
//! Turns a text prompt into an AI-generated image, stages it for preview,
//! and publishes the staged image plus text as a single social post.

pub mod api;
pub mod config;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod twitter;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::Config;
use media::StagingStore;
use openai::OpenAiClient;
use pipeline::Pipeline;
use twitter::TwitterClient;

/// The postd server instance
pub struct Server {
    pipeline: Arc<Pipeline>,
    store: StagingStore,
    listener: TcpListener,
    sweep_interval: Duration,
    sweep_min_age: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    ///
    /// Validates secrets, initializes the staging store, and binds the
    /// listener, so a misconfigured daemon fails here rather than on the
    /// first request.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store = StagingStore::new(&config.staging_dir);
        store.init().await?;

        let images = OpenAiClient::new(&config.image, config.request_timeout());
        let twitter = TwitterClient::new(&config.twitter, config.request_timeout());
        let pipeline = Arc::new(Pipeline::new(store.clone(), images, twitter));

        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            pipeline,
            store,
            listener,
            sweep_interval: config.sweep_interval(),
            sweep_min_age: config.sweep_min_age(),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get the pipeline handle
    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    /// Handle for signaling shutdown after `run` has taken ownership
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the server until shutdown
    pub async fn run(self) -> Result<()> {
        let local_addr = self.listener.local_addr()?;
        info!("postd listening on {}", local_addr);

        let sweeper = tokio::spawn(sweep_loop(
            self.store.clone(),
            self.pipeline.clone(),
            self.sweep_interval,
            self.sweep_min_age,
            self.shutdown_rx.clone(),
        ));

        let router = api::router(self.pipeline.clone(), self.store.clone());
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        sweeper.abort();
        info!("postd shutdown complete");
        Ok(())
    }
}

/// Periodically delete abandoned staged entries. Entries younger than
/// `min_age` and handles still referenced by a session are left alone, so
/// the sweep cannot race an in-flight read.
async fn sweep_loop(
    store: StagingStore,
    pipeline: Arc<Pipeline>,
    interval: Duration,
    min_age: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let exclude = pipeline.active_handles();
                if let Err(e) = store.sweep(&exclude, min_age).await {
                    warn!("Staging sweep failed: {}", e);
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}
