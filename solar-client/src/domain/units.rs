/// Unit tag attached to a cumulative yield counter.
///
/// Telemetry collectors are not consistent about the unit they report in, so
/// every counter value travels with a tag and is normalized to kWh before it
/// enters a summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldUnit {
    WattHour,
    KilowattHour,
    MegawattHour,
    GigawattHour,
}

impl YieldUnit {
    /// Parse a unit tag. Unknown or empty tags return `None`; the caller is
    /// expected to drop that single counter contribution rather than guess.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "wh" => Some(Self::WattHour),
            "kwh" => Some(Self::KilowattHour),
            "mwh" => Some(Self::MegawattHour),
            "gwh" => Some(Self::GigawattHour),
            _ => None,
        }
    }

    pub fn to_kwh(self, value: f64) -> f64 {
        match self {
            Self::WattHour => value / 1_000.0,
            Self::KilowattHour => value,
            Self::MegawattHour => value * 1_000.0,
            Self::GigawattHour => value * 1_000_000.0,
        }
    }
}

/// A total yield scaled to the largest unit that keeps the value >= 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledYield {
    pub value: f64,
    pub unit: &'static str,
}

/// Magnitude-scale a kWh total for display: kWh -> MWh at >= 1,000 and
/// MWh -> GWh at >= 1,000,000. Rounded to two decimals.
pub fn scale_total_yield(kwh: f64) -> ScaledYield {
    let (value, unit) = if kwh >= 1_000_000.0 {
        (kwh / 1_000_000.0, "GWh")
    } else if kwh >= 1_000.0 {
        (kwh / 1_000.0, "MWh")
    } else {
        (kwh, "kWh")
    };
    ScaledYield {
        value: round2(value),
        unit,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_tags_case_insensitively() {
        assert_eq!(YieldUnit::parse("kWh"), Some(YieldUnit::KilowattHour));
        assert_eq!(YieldUnit::parse(" MWH "), Some(YieldUnit::MegawattHour));
        assert_eq!(YieldUnit::parse("gwh"), Some(YieldUnit::GigawattHour));
        assert_eq!(YieldUnit::parse("Wh"), Some(YieldUnit::WattHour));
    }

    #[test]
    fn parse_rejects_unknown_tags() {
        assert_eq!(YieldUnit::parse(""), None);
        assert_eq!(YieldUnit::parse("joules"), None);
    }

    #[test]
    fn normalizes_to_kwh() {
        assert_eq!(YieldUnit::MegawattHour.to_kwh(2.0), 2_000.0);
        assert_eq!(YieldUnit::GigawattHour.to_kwh(1.0), 1_000_000.0);
        assert_eq!(YieldUnit::WattHour.to_kwh(1_500.0), 1.5);
        assert_eq!(YieldUnit::KilowattHour.to_kwh(42.0), 42.0);
    }

    #[test]
    fn scales_totals_at_magnitude_thresholds() {
        assert_eq!(
            scale_total_yield(999.0),
            ScaledYield {
                value: 999.0,
                unit: "kWh"
            }
        );
        assert_eq!(
            scale_total_yield(1_500.0),
            ScaledYield {
                value: 1.5,
                unit: "MWh"
            }
        );
        assert_eq!(
            scale_total_yield(2_250_000.0),
            ScaledYield {
                value: 2.25,
                unit: "GWh"
            }
        );
    }
}
