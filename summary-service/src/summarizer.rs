use std::collections::BTreeMap;
use std::sync::Arc;

use futures::{stream, StreamExt};
use solar_client::domain::{DailySummary, RawReading};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::curve::CurveBuilder;
use crate::directory::DeviceDirectory;
use crate::period::local_day_window;
use crate::store::{DirectoryStore, ReadingStore, StoreError, SummaryStore};

/// Seam for the catch-up controller and the backfill binary.
#[async_trait::async_trait]
pub trait SummarizeDay: Send + Sync {
    /// Produce/refresh one `DailySummary` per device observed on `day`.
    /// Returns the number of upserted rows.
    async fn summarize_day(&self, day: Date) -> Result<usize, StoreError>;
}

pub struct DailySummarizer {
    readings: Arc<dyn ReadingStore>,
    summaries: Arc<dyn SummaryStore>,
    directory: Arc<dyn DirectoryStore>,
    curves: CurveBuilder,
    reading_tables: Vec<String>,
    local_offset: UtcOffset,
    fetch_concurrency: usize,
}

impl DailySummarizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        summaries: Arc<dyn SummaryStore>,
        directory: Arc<dyn DirectoryStore>,
        curves: CurveBuilder,
        reading_tables: Vec<String>,
        local_offset: UtcOffset,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            readings,
            summaries,
            directory,
            curves,
            reading_tables,
            local_offset,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    async fn process_device(
        &self,
        directory: &DeviceDirectory,
        day: Date,
        device_id: &str,
        readings: &[RawReading],
    ) -> Result<(), StoreError> {
        // Windowed batch max over the full device-day group; a mid-day counter
        // reset or out-of-order delivery must not drag the resolved value down.
        let total_yield_kwh = max_counter(readings, RawReading::total_yield_kwh);
        let daily_yield_kwh = max_counter(readings, RawReading::daily_yield_kwh);
        let monthly_yield_kwh = max_counter(readings, RawReading::monthly_yield_kwh);

        let curve_key = match self.curves.build(device_id, day, readings).await {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(device_id, error = %e, "curve artifact write failed");
                None
            }
        };

        let summary = DailySummary {
            device_id: device_id.to_string(),
            day,
            plant_id: directory.plant_of(device_id),
            total_yield_kwh,
            daily_yield_kwh,
            monthly_yield_kwh,
            curve_key,
            last_refreshed: OffsetDateTime::now_utc(),
        };

        self.summaries.upsert_merge(&summary).await
    }
}

#[async_trait::async_trait]
impl SummarizeDay for DailySummarizer {
    async fn summarize_day(&self, day: Date) -> Result<usize, StoreError> {
        let directory = DeviceDirectory::load(&self.directory).await?;
        let (from, until) = local_day_window(day, self.local_offset);

        // Sources are independent; fetch them with bounded fan-out so one pass
        // cannot overwhelm the storage backend.
        let fetches: Vec<(String, Result<Vec<RawReading>, StoreError>)> =
            stream::iter(self.reading_tables.clone())
                .map(|table| {
                    let readings = self.readings.clone();
                    async move {
                        let result = readings.readings_in_window(&table, from, until).await;
                        (table, result)
                    }
                })
                .buffer_unordered(self.fetch_concurrency)
                .collect()
                .await;

        let mut upserts = 0usize;
        for (table, result) in fetches {
            let rows = match result {
                Ok(rows) => rows,
                Err(e) => {
                    // One unreachable source must not abort the others; the
                    // next scheduled run self-heals.
                    tracing::warn!(table = %table, error = %e, "reading fetch failed, skipping source");
                    metrics::counter!("reading_fetch_errors_total").increment(1);
                    continue;
                }
            };
            if rows.is_empty() {
                continue;
            }

            let by_device = group_by_device(rows);
            for (device_id, readings) in &by_device {
                match self
                    .process_device(&directory, day, device_id, readings)
                    .await
                {
                    Ok(()) => {
                        upserts += 1;
                        metrics::counter!("summaries_upserted_total").increment(1);
                    }
                    Err(e) => {
                        tracing::warn!(device_id, error = %e, "summary upsert failed, skipping device");
                        metrics::counter!("summary_upsert_errors_total").increment(1);
                    }
                }
            }
        }

        tracing::info!(day = %day, upserts, "daily summary pass complete");
        Ok(upserts)
    }
}

/// Group readings per device, keeping each group chronological. Readings
/// without a device id are dropped.
fn group_by_device(rows: Vec<RawReading>) -> BTreeMap<String, Vec<RawReading>> {
    let mut by_device: BTreeMap<String, Vec<RawReading>> = BTreeMap::new();
    for row in rows {
        let device = row.device_id.trim();
        if device.is_empty() {
            continue;
        }
        by_device.entry(device.to_string()).or_default().push(row);
    }
    for group in by_device.values_mut() {
        group.sort_by_key(|r| r.ts);
    }
    by_device
}

fn max_counter(readings: &[RawReading], field: impl Fn(&RawReading) -> Option<f64>) -> f64 {
    readings
        .iter()
        .filter_map(field)
        .fold(0.0f64, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        MemoryArtifactStore, MemoryDirectoryStore, MemoryReadingStore, MemorySummaryStore,
    };
    use solar_client::domain::PlantDirectoryEntry;
    use time::macros::{date, datetime};
    use time::Duration;

    const TABLE: &str = "sungrow_inverter_125kw";

    fn reading(device: &str, ts: OffsetDateTime, daily: f64) -> RawReading {
        RawReading {
            ts,
            device_id: device.to_string(),
            ac_power_kw: 40.0,
            dc_power_kw: 42.0,
            daily_yield: Some(daily),
            daily_yield_unit: Some("kWh".to_string()),
            monthly_yield: Some(daily * 10.0),
            monthly_yield_unit: Some("kWh".to_string()),
            total_yield: Some(daily / 1000.0),
            total_yield_unit: Some("MWh".to_string()),
        }
    }

    struct Fixture {
        readings: Arc<MemoryReadingStore>,
        summaries: Arc<MemorySummaryStore>,
        summarizer: DailySummarizer,
    }

    fn fixture() -> Fixture {
        let readings = Arc::new(MemoryReadingStore::new());
        let summaries = Arc::new(MemorySummaryStore::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let directory = Arc::new(MemoryDirectoryStore::new(vec![PlantDirectoryEntry {
            plant_id: 7,
            plant_name: "ESIC Kalaburagi Hospital".to_string(),
            devices: "Inverter_16,Inverter_17".to_string(),
        }]));

        let summarizer = DailySummarizer::new(
            readings.clone(),
            summaries.clone(),
            directory,
            CurveBuilder::new(artifacts, 200),
            vec![TABLE.to_string()],
            time::UtcOffset::UTC,
            2,
        );

        Fixture {
            readings,
            summaries,
            summarizer,
        }
    }

    #[tokio::test]
    async fn resolves_the_daily_counter_by_windowed_max() {
        let f = fixture();
        let base = datetime!(2025-06-01 04:00:00 UTC);
        // Out-of-order / reset-looking sequence; the max wins, not the last.
        for (i, value) in [12.0, 8.5, 15.3, 9.0].into_iter().enumerate() {
            f.readings
                .push(TABLE, reading("Inverter_16", base + Duration::hours(i as i64), value))
                .await;
        }

        let upserts = f
            .summarizer
            .summarize_day(date!(2025 - 06 - 01))
            .await
            .expect("summarize");
        assert_eq!(upserts, 1);

        let rows = f.summaries.all_summaries().await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].daily_yield_kwh, 15.3);
        assert_eq!(rows[0].plant_id, Some(7));
        // MWh total counter normalized to kWh.
        assert_eq!(rows[0].total_yield_kwh, 15.3);
        assert_eq!(
            rows[0].curve_key.as_deref(),
            Some("Inverter_16_2025-06-01.json")
        );
    }

    #[tokio::test]
    async fn summarizing_twice_converges_to_identical_rows() {
        let f = fixture();
        let base = datetime!(2025-06-01 04:00:00 UTC);
        for (i, value) in [3.0, 7.5, 5.0].into_iter().enumerate() {
            f.readings
                .push(TABLE, reading("Inverter_16", base + Duration::hours(i as i64), value))
                .await;
            f.readings
                .push(TABLE, reading("Inverter_17", base + Duration::hours(i as i64), value * 2.0))
                .await;
        }
        let day = date!(2025 - 06 - 01);

        f.summarizer.summarize_day(day).await.expect("first run");
        let mut first = f.summaries.all_summaries().await.expect("rows");

        f.summarizer.summarize_day(day).await.expect("second run");
        let mut second = f.summaries.all_summaries().await.expect("rows");

        // Refresh timestamps move; everything the consumers read must not.
        for row in first.iter_mut().chain(second.iter_mut()) {
            row.last_refreshed = datetime!(2025-06-02 00:00:00 UTC);
        }
        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn a_day_with_no_readings_is_a_no_op_not_an_error() {
        let f = fixture();
        let upserts = f
            .summarizer
            .summarize_day(date!(2025 - 06 - 01))
            .await
            .expect("summarize");
        assert_eq!(upserts, 0);
        assert!(f.summaries.all_summaries().await.expect("rows").is_empty());
    }

    #[tokio::test]
    async fn readings_outside_the_local_day_are_ignored() {
        let f = fixture();
        f.readings
            .push(TABLE, reading("Inverter_16", datetime!(2025-05-31 23:59:00 UTC), 99.0))
            .await;
        f.readings
            .push(TABLE, reading("Inverter_16", datetime!(2025-06-01 00:01:00 UTC), 4.0))
            .await;

        f.summarizer
            .summarize_day(date!(2025 - 06 - 01))
            .await
            .expect("summarize");

        let rows = f.summaries.all_summaries().await.expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].daily_yield_kwh, 4.0);
    }
}
