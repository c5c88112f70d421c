use time::OffsetDateTime;

use super::units::YieldUnit;

/// One telemetry sample for one inverter at one instant, as stored by the
/// external collectors. Cumulative counters are monotonic within their reset
/// period (daily resets at local midnight, monthly at month start) and each
/// carries its own unit tag.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawReading {
    pub ts: OffsetDateTime,
    pub device_id: String,
    pub ac_power_kw: f64,
    pub dc_power_kw: f64,
    pub daily_yield: Option<f64>,
    pub daily_yield_unit: Option<String>,
    pub monthly_yield: Option<f64>,
    pub monthly_yield_unit: Option<String>,
    pub total_yield: Option<f64>,
    pub total_yield_unit: Option<String>,
}

impl RawReading {
    pub fn daily_yield_kwh(&self) -> Option<f64> {
        normalize(self.daily_yield, self.daily_yield_unit.as_deref())
    }

    pub fn monthly_yield_kwh(&self) -> Option<f64> {
        normalize(self.monthly_yield, self.monthly_yield_unit.as_deref())
    }

    pub fn total_yield_kwh(&self) -> Option<f64> {
        normalize(self.total_yield, self.total_yield_unit.as_deref())
    }
}

/// A counter with a missing or unparseable unit tag contributes nothing;
/// dropping the single value is cheaper than guessing its magnitude.
fn normalize(value: Option<f64>, unit: Option<&str>) -> Option<f64> {
    let value = value?;
    if !value.is_finite() {
        return None;
    }
    let unit = YieldUnit::parse(unit?)?;
    Some(unit.to_kwh(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn reading(value: f64, unit: &str) -> RawReading {
        RawReading {
            ts: datetime!(2025-06-01 06:00:00 UTC),
            device_id: "Inverter_16".to_string(),
            ac_power_kw: 40.0,
            dc_power_kw: 42.5,
            daily_yield: Some(value),
            daily_yield_unit: Some(unit.to_string()),
            monthly_yield: None,
            monthly_yield_unit: None,
            total_yield: None,
            total_yield_unit: None,
        }
    }

    #[test]
    fn daily_yield_is_normalized_through_its_unit_tag() {
        assert_eq!(reading(2.0, "MWh").daily_yield_kwh(), Some(2_000.0));
        assert_eq!(reading(1.0, "GWh").daily_yield_kwh(), Some(1_000_000.0));
        assert_eq!(reading(500.0, "Wh").daily_yield_kwh(), Some(0.5));
    }

    #[test]
    fn unknown_unit_drops_the_counter() {
        assert_eq!(reading(2.0, "furlongs").daily_yield_kwh(), None);
    }

    #[test]
    fn missing_counter_yields_none_without_touching_the_unit() {
        let mut r = reading(1.0, "kWh");
        r.daily_yield = None;
        assert_eq!(r.daily_yield_kwh(), None);
        assert_eq!(r.monthly_yield_kwh(), None);
        assert_eq!(r.total_yield_kwh(), None);
    }

    #[test]
    fn non_finite_counter_is_dropped() {
        assert_eq!(reading(f64::NAN, "kWh").daily_yield_kwh(), None);
    }
}
