use std::sync::Arc;

use solar_client::domain::{daily_summary::format_day, CurvePoint, RawReading};
use time::Date;

use crate::store::{ArtifactStore, StoreError};

/// Builds the bounded power-curve artifact for one device-day.
///
/// Downsampling is a fixed-stride decimation: `stride = ceil(count / cap)`,
/// keep every stride-th reading. It is deliberately not an averaging
/// resample; the artifact is a representative sample of the trace, and
/// consumers sum aligned points across devices.
pub struct CurveBuilder {
    artifacts: Arc<dyn ArtifactStore>,
    max_points: usize,
}

/// Artifact key for a device-day: `{device}_{date}.json`.
pub fn curve_key(device_id: &str, day: Date) -> String {
    format!("{device_id}_{}.json", format_day(day))
}

pub fn downsample(readings: &[RawReading], max_points: usize) -> Vec<CurvePoint> {
    if readings.is_empty() || max_points == 0 {
        return Vec::new();
    }
    let stride = readings.len().div_ceil(max_points);
    readings
        .iter()
        .step_by(stride)
        .map(|r| CurvePoint {
            time: r.ts,
            ac_kw: r.ac_power_kw,
            dc_kw: r.dc_power_kw,
        })
        .collect()
}

impl CurveBuilder {
    pub fn new(artifacts: Arc<dyn ArtifactStore>, max_points: usize) -> Self {
        Self {
            artifacts,
            max_points,
        }
    }

    /// Downsample `readings` (chronological) and store the artifact if the
    /// device-day key is still vacant. Re-runs for an already-closed day get
    /// the existing identifier back without a write.
    pub async fn build(
        &self,
        device_id: &str,
        day: Date,
        readings: &[RawReading],
    ) -> Result<String, StoreError> {
        let key = curve_key(device_id, day);
        let points = downsample(readings, self.max_points);

        let created = self.artifacts.create_if_absent(&key, &points).await?;
        if created {
            metrics::counter!("curve_artifacts_created_total").increment(1);
            tracing::debug!(device_id, key = %key, points = points.len(), "curve artifact written");
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryArtifactStore;
    use time::macros::{date, datetime};
    use time::Duration;

    fn minute_readings(count: usize) -> Vec<RawReading> {
        let start = datetime!(2025-06-01 00:00:00 UTC);
        (0..count)
            .map(|i| RawReading {
                ts: start + Duration::minutes(i as i64),
                device_id: "Inverter_16".to_string(),
                ac_power_kw: i as f64,
                dc_power_kw: i as f64 * 1.05,
                daily_yield: None,
                daily_yield_unit: None,
                monthly_yield: None,
                monthly_yield_unit: None,
                total_yield: None,
                total_yield_unit: None,
            })
            .collect()
    }

    #[test]
    fn a_full_day_of_minute_readings_decimates_with_stride_8() {
        let readings = minute_readings(1_440);
        let points = downsample(&readings, 200);

        // ceil(1440 / 200) = 8; every 8th reading survives.
        assert_eq!(points.len(), 180);
        assert!(points.len() <= 200);
        assert_eq!(points[0].time, readings[0].ts);
        assert_eq!(points[1].time, readings[8].ts);
    }

    #[test]
    fn short_traces_are_kept_whole() {
        let readings = minute_readings(42);
        let points = downsample(&readings, 200);
        assert_eq!(points.len(), 42);
    }

    #[test]
    fn empty_input_builds_an_empty_curve() {
        assert!(downsample(&[], 200).is_empty());
    }

    #[test]
    fn key_embeds_device_and_date() {
        assert_eq!(
            curve_key("Inverter_16", date!(2025 - 06 - 01)),
            "Inverter_16_2025-06-01.json"
        );
    }

    #[tokio::test]
    async fn second_build_returns_the_same_key_without_rewriting() {
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let builder = CurveBuilder::new(artifacts.clone(), 200);
        let day = date!(2025 - 06 - 01);

        let first = minute_readings(10);
        let key_a = builder.build("Inverter_16", day, &first).await.expect("build");

        // A later run with different readings must not overwrite the artifact.
        let second = minute_readings(3);
        let key_b = builder.build("Inverter_16", day, &second).await.expect("build");

        assert_eq!(key_a, key_b);
        let stored = artifacts.read(&key_a).await.expect("read").expect("exists");
        assert_eq!(stored.len(), 10);
    }
}
