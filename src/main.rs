//! framerelay: MJPEG relay between an upload endpoint and browser viewers

use color_eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framerelay::{server, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    init_tracing();

    info!("framerelay launching...");

    let config = Config::load()?;
    info!("Configuration: {:?}", config);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping streams");
                    shutdown.cancel();
                }
                Err(e) => error!("Failed to listen for ctrl-c: {}", e),
            }
        });
    }

    server::serve(&config, shutdown).await?;

    info!("framerelay shutting down");
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();
}

#[cfg(feature = "profiling")]
fn init_tracing() {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_timer(tracing_subscriber::fmt::time::uptime()))
        .with(tracing_tracy::TracyLayer::default())
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framerelay=info"))
}
