use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use tally::api;
use tally::config::{Config, DatabaseBackend};
use tally::presence::PresenceTracker;
use tally::storage::{PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(SqliteStorage::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };

    // Initialize database
    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    // Initialize presence tracking
    let presence = Arc::new(PresenceTracker::new(config.presence.window_secs));
    let _sweep_task = presence.start_sweep_task(config.presence.sweep_interval_secs);
    info!(
        "Presence tracking enabled (window: {}s, sweep every {}s)",
        config.presence.window_secs, config.presence.sweep_interval_secs
    );

    // Create router
    let router = api::create_router(
        Arc::clone(&storage),
        Arc::clone(&presence),
        config.cookie.clone(),
    );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
