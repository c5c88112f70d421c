use time::{Date, OffsetDateTime};

/// One row per device-day: the day's resolved yields in kWh, the owning plant
/// (if the directory knows the device), and a reference to the day's curve
/// artifact. Upserted by the summarizer with merge semantics; never deleted.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailySummary {
    pub device_id: String,
    pub day: Date,
    pub plant_id: Option<i64>,
    pub total_yield_kwh: f64,
    pub daily_yield_kwh: f64,
    pub monthly_yield_kwh: f64,
    pub curve_key: Option<String>,
    pub last_refreshed: OffsetDateTime,
}

impl DailySummary {
    /// `YYYY-MM-DD` label used for trend grouping and cache payloads.
    pub fn day_label(&self) -> String {
        format_day(self.day)
    }
}

pub fn format_day(day: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        day.year(),
        u8::from(day.month()),
        day.day()
    )
}
