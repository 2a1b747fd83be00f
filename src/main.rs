//! Tiered Cache - HTTP server over a two-tier cache
//!
//! Serves one `TieredCache` backed by SQLite (or memory when no database
//! path is configured).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiered_cache::{
    create_router, AppState, Config, InMemoryBackend, SqliteBackend, StorageBackend, TieredCache,
};

/// Main entry point for the tiered cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache over the configured storage backend (starts the janitor)
/// 4. Create Axum router with all endpoints
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM, then destroy the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiered_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tiered Cache Server");

    let config = Config::from_env();
    info!(
        max_size = config.max_size,
        default_ttl_ms = config.default_ttl_ms,
        cleanup_interval_ms = config.cleanup_interval_ms,
        strategy = %config.strategy,
        port = config.server_port,
        "Configuration loaded"
    );

    let backend: Arc<dyn StorageBackend> = match &config.db_path {
        Some(path) => {
            info!(path = %path.display(), "Using SQLite storage");
            Arc::new(SqliteBackend::new(path))
        }
        None => {
            info!("No CACHE_DB_PATH set, persistent tier kept in memory");
            Arc::new(InMemoryBackend::new())
        }
    };

    let cache = TieredCache::create(&config, backend).context("failed to create cache")?;
    info!("Cache initialized, janitor started");

    if let Some(url) = &config.upstream_url {
        info!(upstream = %url, "Fetching misses from upstream");
    }

    let app = create_router(AppState::from_config(cache.clone(), &config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cache.destroy();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
