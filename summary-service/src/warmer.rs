use std::sync::Arc;

use solar_client::domain::DailySummary;
use time::{Date, Duration, OffsetDateTime};

use crate::directory::DeviceDirectory;
use crate::period::{month_window, week_window};
use crate::scope::Scope;
use crate::store::{CacheStore, DirectoryStore, StoreError, SummaryStore};
use crate::trend::{daily_trend, trend_total_kwh, QueryResponse};

/// Precomputes the current ISO week's and calendar month's roll-ups for every
/// plant and for the all-plants scope, and sweeps cache entries past the
/// retention window. Both halves are advisory: a failed cache write is logged
/// and the warmer moves on.
pub struct CacheWarmer {
    summaries: Arc<dyn SummaryStore>,
    directory: Arc<dyn DirectoryStore>,
    cache: Arc<dyn CacheStore>,
    retention_days: i64,
}

impl CacheWarmer {
    pub fn new(
        summaries: Arc<dyn SummaryStore>,
        directory: Arc<dyn DirectoryStore>,
        cache: Arc<dyn CacheStore>,
        retention_days: i64,
    ) -> Self {
        Self {
            summaries,
            directory,
            cache,
            retention_days,
        }
    }

    pub async fn warm(&self, today: Date) -> Result<(), StoreError> {
        let directory = DeviceDirectory::load(&self.directory).await?;

        let (week_from, week_until) = week_window(today);
        let (month_from, month_until) = month_window(today);

        // One fetch covers both windows; the week always sits inside the
        // month-or-adjacent range.
        let from = week_from.min(month_from);
        let until = week_until.max(month_until);
        let rows = self.summaries.summaries_in_window(from, until).await?;

        let mut scopes: Vec<Scope> = directory
            .plants()
            .iter()
            .map(|p| Scope::for_plant(p.plant_id))
            .collect();
        scopes.push(Scope::all());

        for scope in scopes {
            let sig = scope.signature();
            let week_rows: Vec<DailySummary> = rows
                .iter()
                .filter(|s| s.day >= week_from && s.day < week_until && scope.allows(s))
                .cloned()
                .collect();
            let month_rows: Vec<DailySummary> = rows
                .iter()
                .filter(|s| s.day >= month_from && s.day < month_until && scope.allows(s))
                .cloned()
                .collect();

            self.write_entry(&format!("week_0_{sig}"), &week_rows).await;
            self.write_entry(&format!("month_0_{sig}"), &month_rows).await;
        }

        Ok(())
    }

    async fn write_entry(&self, key: &str, rows: &[DailySummary]) {
        let trend = daily_trend(rows);
        let total = trend_total_kwh(&trend);
        let response = QueryResponse::new(total, trend, Vec::new());

        let payload = match serde_json::to_string(&response) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache payload serialization failed");
                return;
            }
        };

        if let Err(e) = self.cache.put(key, &payload).await {
            tracing::warn!(key, error = %e, "cache write failed");
            metrics::counter!("cache_write_errors_total").increment(1);
        } else {
            tracing::debug!(key, "cache entry warmed");
        }
    }

    /// Storage-growth bound, independent of read-path freshness.
    pub async fn evict(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let cutoff = now - Duration::days(self.retention_days);
        let removed = self.cache.evict_older_than(cutoff).await?;
        if removed > 0 {
            metrics::counter!("cache_entries_evicted_total").increment(removed);
            tracing::info!(removed, "cache retention sweep complete");
        }
        Ok(removed)
    }
}
