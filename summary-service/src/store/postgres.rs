use solar_client::{
    db::{directory_queries, reading_queries, summary_queries},
    domain::{CurvePoint, DailySummary, GrantRow, PlantDirectoryEntry, RawReading},
};
use sqlx::{PgPool, Row};
use time::{Date, OffsetDateTime};

use super::{
    ArtifactStore, CacheEntry, CacheStore, DirectoryStore, GrantStore, ReadingStore, StoreError,
    SummaryStore,
};

/// One Postgres-backed implementation of every storage seam. Cloning shares
/// the underlying pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgStore {
    async fn readings_in_window(
        &self,
        table: &str,
        from: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Vec<RawReading>, StoreError> {
        Ok(reading_queries::readings_in_window(&self.pool, table, from, until).await?)
    }
}

#[async_trait::async_trait]
impl SummaryStore for PgStore {
    async fn upsert_merge(&self, summary: &DailySummary) -> Result<(), StoreError> {
        Ok(summary_queries::upsert_merge(&self.pool, summary).await?)
    }

    async fn summaries_in_window(
        &self,
        from: Date,
        until: Date,
    ) -> Result<Vec<DailySummary>, StoreError> {
        Ok(summary_queries::summaries_in_window(&self.pool, from, until).await?)
    }

    async fn all_summaries(&self) -> Result<Vec<DailySummary>, StoreError> {
        Ok(summary_queries::all_summaries(&self.pool).await?)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for PgStore {
    async fn create_if_absent(
        &self,
        key: &str,
        points: &[CurvePoint],
    ) -> Result<bool, StoreError> {
        let body = serde_json::to_string(points)?;
        let result = sqlx::query(
            r#"
            INSERT INTO curve_artifacts (curve_key, points, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (curve_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<CurvePoint>>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT points
            FROM curve_artifacts
            WHERE curve_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let body: String = row.try_get("points")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl CacheStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT payload, cached_at
            FROM query_cache
            WHERE cache_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(CacheEntry {
                payload: row.try_get("payload")?,
                cached_at: row.try_get("cached_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO query_cache (cache_key, payload, cached_at)
            VALUES ($1, $2, now())
            ON CONFLICT (cache_key) DO UPDATE SET
                payload   = EXCLUDED.payload,
                cached_at = EXCLUDED.cached_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn evict_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM query_cache
            WHERE cached_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl DirectoryStore for PgStore {
    async fn plant_directory(&self) -> Result<Vec<PlantDirectoryEntry>, StoreError> {
        Ok(directory_queries::plant_directory(&self.pool).await?)
    }
}

#[async_trait::async_trait]
impl GrantStore for PgStore {
    async fn grant_rows(&self, principal: &str) -> Result<Vec<GrantRow>, StoreError> {
        Ok(directory_queries::grant_rows(&self.pool, principal).await?)
    }
}
