//! In-process implementations of the storage seams. They back the unit tests
//! and stand in behind the same cache/artifact contracts when no durable
//! store is configured.

use std::collections::{BTreeMap, HashMap};

use solar_client::domain::{CurvePoint, DailySummary, GrantRow, PlantDirectoryEntry, RawReading};
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;

use super::{
    ArtifactStore, CacheEntry, CacheStore, DirectoryStore, GrantStore, ReadingStore, StoreError,
    SummaryStore,
};

#[derive(Default)]
pub struct MemoryReadingStore {
    tables: RwLock<HashMap<String, Vec<RawReading>>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, table: &str, reading: RawReading) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(reading);
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn readings_in_window(
        &self,
        table: &str,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Vec<RawReading>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<RawReading> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.ts >= from && r.ts < until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.ts);
        Ok(rows)
    }
}

#[derive(Default)]
pub struct MemorySummaryStore {
    rows: RwLock<BTreeMap<(Date, String), DailySummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, summary: DailySummary) {
        let mut rows = self.rows.write().await;
        rows.insert((summary.day, summary.device_id.clone()), summary);
    }
}

#[async_trait::async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn upsert_merge(&self, summary: &DailySummary) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let key = (summary.day, summary.device_id.clone());
        match rows.get_mut(&key) {
            // Same merge rules as the Postgres upsert: yields never decrease,
            // plant/curve only move from empty to set.
            Some(existing) => {
                if existing.plant_id.is_none() {
                    existing.plant_id = summary.plant_id;
                }
                existing.total_yield_kwh = existing.total_yield_kwh.max(summary.total_yield_kwh);
                existing.daily_yield_kwh = existing.daily_yield_kwh.max(summary.daily_yield_kwh);
                existing.monthly_yield_kwh =
                    existing.monthly_yield_kwh.max(summary.monthly_yield_kwh);
                if existing.curve_key.is_none() {
                    existing.curve_key = summary.curve_key.clone();
                }
                existing.last_refreshed = summary.last_refreshed;
            }
            None => {
                rows.insert(key, summary.clone());
            }
        }
        Ok(())
    }

    async fn summaries_in_window(
        &self,
        from: Date,
        until: Date,
    ) -> Result<Vec<DailySummary>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|s| s.day >= from && s.day < until)
            .cloned()
            .collect())
    }

    async fn all_summaries(&self) -> Result<Vec<DailySummary>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<CurvePoint>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn create_if_absent(
        &self,
        key: &str,
        points: &[CurvePoint],
    ) -> Result<bool, StoreError> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.contains_key(key) {
            return Ok(false);
        }
        artifacts.insert(key.to_string(), points.to_vec());
        Ok(true)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<CurvePoint>>, StoreError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.get(key).cloned())
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit cached-at instant; staleness tests use this to
    /// plant entries in the past.
    pub async fn insert_at(&self, key: &str, payload: &str, cached_at: OffsetDateTime) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.to_string(),
                cached_at,
            },
        );
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        self.insert_at(key, payload, OffsetDateTime::now_utc()).await;
        Ok(())
    }

    async fn evict_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.cached_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

pub struct MemoryDirectoryStore {
    entries: Vec<PlantDirectoryEntry>,
}

impl MemoryDirectoryStore {
    pub fn new(entries: Vec<PlantDirectoryEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait::async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn plant_directory(&self) -> Result<Vec<PlantDirectoryEntry>, StoreError> {
        Ok(self.entries.clone())
    }
}

#[derive(Default)]
pub struct MemoryGrantStore {
    rows: HashMap<String, Vec<GrantRow>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_plants(mut self, principal: &str, plants: &[i64]) -> Self {
        let rows = plants
            .iter()
            .map(|p| GrantRow {
                plant_id: Some(*p),
                is_admin: false,
            })
            .collect();
        self.rows.insert(principal.to_string(), rows);
        self
    }

    pub fn grant_admin(mut self, principal: &str) -> Self {
        self.rows.insert(
            principal.to_string(),
            vec![GrantRow {
                plant_id: None,
                is_admin: true,
            }],
        );
        self
    }
}

#[async_trait::async_trait]
impl GrantStore for MemoryGrantStore {
    async fn grant_rows(&self, principal: &str) -> Result<Vec<GrantRow>, StoreError> {
        Ok(self.rows.get(principal).cloned().unwrap_or_default())
    }
}
