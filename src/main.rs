//! Dynamo Cache - A DynamoDB-backed cache provider
//!
//! Serves the cache provider over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynamo_cache::api::create_router;
use dynamo_cache::pool::ClientFactory;
use dynamo_cache::store::{DynamoClientFactory, MemoryClientFactory};
use dynamo_cache::{AppState, Backend, CacheConfig, ClientPool, DynamoCache};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the client pool for the configured backend
/// 4. Bootstrap the cache table
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM, then release pooled clients
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynamo_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dynamo Cache Server");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: table={}, backend={:?}, region={}, live_timeout={}ms, port={}",
        config.table_name,
        config.backend,
        config.client_settings().effective_region(),
        config.live_timeout_ms,
        config.server_port
    );

    let factory: Arc<dyn ClientFactory> = match config.backend {
        Backend::DynamoDb => Arc::new(DynamoClientFactory),
        Backend::Memory => Arc::new(MemoryClientFactory::default()),
    };
    let pool = Arc::new(ClientPool::new(factory));

    let cache = DynamoCache::init(&config, pool.clone())
        .await
        .context("Failed to initialize cache")?;
    info!("Cache initialized on table '{}'", cache.table());

    let app = create_router(AppState::new(cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close_all();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
