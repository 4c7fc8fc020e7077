//! Overlay Link - loopback demo
//!
//! Runs a producer and a client in one process over a private segment and
//! logs what the render side would see each second.

use anyhow::Result;
use overlay_link::loopback::{self, LoopbackOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let summary = loopback::run(LoopbackOptions::default()).await?;
    tracing::info!(
        "Demo finished after {} frames: {:?}",
        summary.frames,
        summary.metrics
    );
    Ok(())
}
