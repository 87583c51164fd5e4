//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, InMemoryDb},
    build_router,
    config::Config,
    error::ApiError,
    sweeper::spawn_sweeper,
    web::AppState,
};
use reading_groups_core::ports::DatabaseService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; groups are kept in memory and lost on restart.");
            Arc::new(InMemoryDb::new())
        }
    };

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(db, config.clone()));

    // --- 4. Start the Background Sweeper ---
    let shutdown = CancellationToken::new();
    let sweeper = config
        .sweep_interval
        .map(|period| spawn_sweeper(app_state.reading.clone(), period, shutdown.clone()));

    // --- 5. Create the Web Router ---
    let app = build_router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
    info!("Server stopped.");
    Ok(())
}
