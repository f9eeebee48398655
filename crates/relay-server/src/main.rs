//! # Signal Relay
//!
//! WebRTC signaling relay for two-party interview rooms.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! signal-relay
//!
//! # Run with a custom config file
//! RELAY_CONFIG=/path/to/relay.toml signal-relay
//!
//! # Run with environment variables
//! PORT=4000 RELAY_HOST=0.0.0.0 signal-relay
//! ```

mod config;
mod handlers;
mod metrics;
mod session;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "signal_relay=debug,relay_core=debug,relay_transport=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        "Starting signaling server on {}:{}",
        config.host,
        config.port
    );

    // Initialize metrics
    if config.metrics.enabled {
        metrics::init_metrics();
    }

    handlers::run_server(config).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_default_filter_covers_server_and_core() {
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "signal_relay::session", Level::INFO));
            assert!(tracing::enabled!(target: "signal_relay::handlers", Level::DEBUG));
            assert!(tracing::enabled!(target: "relay_core::router", Level::DEBUG));
            assert!(tracing::enabled!(target: "relay_transport::websocket", Level::WARN));
            assert!(!tracing::enabled!(target: "hyper::proto", Level::DEBUG));
        });
    }
}
