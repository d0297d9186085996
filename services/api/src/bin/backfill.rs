//! services/api/src/bin/backfill.rs
//!
//! One-shot administrative tool: fills in `created_at` for bibliography
//! records that predate the column, deriving each timestamp from the
//! record's identifier. Processes bounded batches with a per-record retry
//! and an inter-batch delay; safe to re-run, since only rows still missing
//! the timestamp are touched.

use api_lib::{adapters::db::DbAdapter, config::Config, error::ApiError};
use biblio_core::oid;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BATCH_SIZE: i64 = 100;
const BATCH_DELAY: Duration = Duration::from_millis(500);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    let adapter = DbAdapter::new(db_pool);

    let mut processed: u64 = 0;
    let mut failed: u64 = 0;
    let mut cursor = String::new();
    loop {
        let batch = adapter.ids_missing_created_at(&cursor, BATCH_SIZE).await?;
        if batch.is_empty() {
            break;
        }
        info!(batch_len = batch.len(), processed, "backfilling batch");

        for id in &batch {
            let created_at = oid::extract_timestamp(id);
            let mut attempts = 0;
            loop {
                attempts += 1;
                match adapter.backfill_created_at(id, created_at).await {
                    Ok(()) => {
                        processed += 1;
                        break;
                    }
                    Err(e) if attempts < RETRY_ATTEMPTS => {
                        warn!(%id, attempts, "backfill write failed, retrying: {e}");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                    Err(e) => {
                        warn!(%id, "giving up on record: {e}");
                        failed += 1;
                        break;
                    }
                }
            }
        }

        if let Some(last) = batch.last() {
            cursor = last.clone();
        }
        if (batch.len() as i64) < BATCH_SIZE {
            break;
        }
        tokio::time::sleep(BATCH_DELAY).await;
    }

    info!(processed, failed, "backfill complete");
    Ok(())
}
