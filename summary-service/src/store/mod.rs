pub mod memory;
pub mod postgres;

use solar_client::domain::{CurvePoint, DailySummary, GrantRow, PlantDirectoryEntry, RawReading};
use time::{Date, OffsetDateTime};

pub use memory::{
    MemoryArtifactStore, MemoryCacheStore, MemoryDirectoryStore, MemoryGrantStore,
    MemoryReadingStore, MemorySummaryStore,
};
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<sqlx::Error>() {
            Ok(db) => Self::Database(db),
            Err(e) => Self::Other(e.to_string()),
        }
    }
}

/// Append-only raw-reading source, queryable by time range per table.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn readings_in_window(
        &self,
        table: &str,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Vec<RawReading>, StoreError>;
}

/// Device-day summary rows: one producer (summarizer), read-only consumers.
#[async_trait::async_trait]
pub trait SummaryStore: Send + Sync {
    async fn upsert_merge(&self, summary: &DailySummary) -> Result<(), StoreError>;

    /// Rows with `day` in `[from, until)`.
    async fn summaries_in_window(&self, from: Date, until: Date)
        -> Result<Vec<DailySummary>, StoreError>;

    async fn all_summaries(&self) -> Result<Vec<DailySummary>, StoreError>;
}

/// Write-once curve artifacts addressed by a `{device}_{date}.json` key.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns true when the artifact was created, false when the key already
    /// held one (in which case the prior contents are left untouched).
    async fn create_if_absent(&self, key: &str, points: &[CurvePoint])
        -> Result<bool, StoreError>;

    async fn read(&self, key: &str) -> Result<Option<Vec<CurvePoint>>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized response payload, stored opaque to the cache.
    pub payload: String,
    pub cached_at: OffsetDateTime,
}

/// Advisory query cache: upsert, point read, full-scan eviction. Never a
/// correctness dependency.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    async fn put(&self, key: &str, payload: &str) -> Result<(), StoreError>;

    /// Delete entries cached before `cutoff`; returns how many were removed.
    async fn evict_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError>;
}

#[async_trait::async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn plant_directory(&self) -> Result<Vec<PlantDirectoryEntry>, StoreError>;
}

#[async_trait::async_trait]
pub trait GrantStore: Send + Sync {
    async fn grant_rows(&self, principal: &str) -> Result<Vec<GrantRow>, StoreError>;
}
