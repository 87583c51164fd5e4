//! services/api/src/bin/import_groups.rs
//!
//! Imports a JSON export of legacy `NewGroup` documents into the database.
//!
//! Usage: `import_groups <export.json>` with `DATABASE_URL` set.

use api_lib::{
    adapters::DbAdapter,
    config::{Config, ConfigError},
    error::ApiError,
    import::parse_export,
};
use chrono::Utc;
use reading_groups_core::ports::DatabaseService;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| ApiError::Internal("usage: import_groups <export.json>".to_string()))?;
    let database_url = config
        .database_url
        .clone()
        .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

    let json = tokio::fs::read_to_string(&path).await?;
    let documents = parse_export(&json)
        .map_err(|e| ApiError::Internal(format!("{} is not a JSON array: {}", path, e)))?;
    info!("Read {} documents from {}", documents.len(), path);

    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    let db = DbAdapter::new(db_pool);
    db.run_migrations().await?;

    let now = Utc::now();
    let (mut imported, mut failed) = (0usize, 0usize);
    for document in documents {
        let result = match document {
            Ok(doc) => {
                let legacy_id = doc.object_id.clone();
                doc.into_group(now)
                    .map_err(|e| e.to_string())
                    .map(|group| (legacy_id, group))
            }
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok((legacy_id, group)) => match db.insert_group(group).await {
                Ok(group) => {
                    imported += 1;
                    info!(legacy_id = %legacy_id, group_id = %group.id, "Imported group");
                }
                Err(e) => {
                    failed += 1;
                    error!(legacy_id = %legacy_id, "Failed to store group: {}", e);
                }
            },
            Err(e) => {
                failed += 1;
                error!("Skipped document: {}", e);
            }
        }
    }

    info!("Import finished: {} imported, {} skipped", imported, failed);
    Ok(())
}
