use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::config::StoreConfig;
use crate::domain::{BucketTotal, MetricPoint, TotalKind};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Write rejected: {0}")]
    Rejected(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Store credentials rejected: {0}")]
    Unauthorized(String),
}

impl StoreError {
    /// Errors no amount of waiting will fix; the process should exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unauthorized(_))
    }
}

/// Durable home for points and totals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Append a point; never updates an existing one.
    async fn insert_point(&self, point: &MetricPoint) -> Result<(), StoreError>;
    /// Replace the total keyed by `(id, TotalBucket)`.
    async fn upsert_total(&self, total: &BucketTotal) -> Result<(), StoreError>;
    async fn query_total(&self, kind: TotalKind, bucket: i32) -> Result<Option<BucketTotal>, StoreError>;
}

/// Open the configured store. An empty URL keeps everything in memory, with
/// points pruned after `retention_days`.
pub async fn open_store(cfg: &StoreConfig, retention_days: u32) -> anyhow::Result<Arc<dyn MetricStore>> {
    if cfg.url.trim().is_empty() {
        warn!(retention_days, "store.url not set, points and totals are kept in memory only");
        return Ok(Arc::new(MemoryStore::with_retention(retention_days)));
    }

    #[cfg(feature = "db")]
    {
        let store = pg::PgStore::connect(&cfg.url, cfg.max_connections).await?;
        store.ensure_schema().await?;
        tracing::info!("connected to PostgreSQL metric store");
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "db"))]
    {
        anyhow::bail!("store.url is set but this build was compiled without the `db` feature");
    }
}
