//! Shared response shapes and aggregation helpers used by both the query
//! service (cache-miss path) and the cache warmer (precompute path), so a
//! warmed entry and a live recomputation are byte-compatible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use solar_client::domain::{
    units::{round2, scale_total_yield},
    CurvePoint, DailySummary,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    #[serde(rename = "valueKWh")]
    pub value_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub total_yield: f64,
    pub yield_unit: String,
    pub yield_trend: Vec<TrendPoint>,
    pub power_curve: Vec<CurvePoint>,
}

impl QueryResponse {
    pub fn new(total_kwh: f64, yield_trend: Vec<TrendPoint>, power_curve: Vec<CurvePoint>) -> Self {
        let scaled = scale_total_yield(total_kwh);
        Self {
            total_yield: scaled.value,
            yield_unit: scaled.unit.to_string(),
            yield_trend,
            power_curve,
        }
    }
}

/// Group summaries per day label and sum the daily yields, sorted by label.
pub fn daily_trend(rows: &[DailySummary]) -> Vec<TrendPoint> {
    let mut grouped: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        *grouped.entry(row.day_label()).or_insert(0.0) += row.daily_yield_kwh;
    }
    grouped
        .into_iter()
        .map(|(label, value_kwh)| TrendPoint {
            label,
            value_kwh: round2(value_kwh),
        })
        .collect()
}

/// Sum of the per-day trend, before unit scaling.
pub fn trend_total_kwh(trend: &[TrendPoint]) -> f64 {
    trend.iter().map(|p| p.value_kwh).sum()
}

/// Per-device maximum of the cumulative total-yield counter, summed across
/// devices. Cumulative counters are never summed across snapshots; the
/// maximum stands for the period-end value.
pub fn max_total_yield_kwh(rows: &[DailySummary]) -> f64 {
    let mut per_device: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        let entry = per_device.entry(row.device_id.as_str()).or_insert(0.0);
        *entry = entry.max(row.total_yield_kwh);
    }
    per_device.values().sum()
}

/// Merge per-device curves into one, summing AC/DC per aligned timestamp.
pub fn merge_power_curves(curves: Vec<Vec<CurvePoint>>) -> Vec<CurvePoint> {
    let mut merged: BTreeMap<time::OffsetDateTime, (f64, f64)> = BTreeMap::new();
    for curve in curves {
        for point in curve {
            let slot = merged.entry(point.time).or_insert((0.0, 0.0));
            slot.0 += point.ac_kw;
            slot.1 += point.dc_kw;
        }
    }
    merged
        .into_iter()
        .map(|(time, (ac_kw, dc_kw))| CurvePoint { time, ac_kw, dc_kw })
        .collect()
}
