use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One downsampled point of a device-day power trace. A curve artifact is a
/// chronological `Vec<CurvePoint>` capped at the configured point budget and
/// stored write-once under a `{device}_{date}.json` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    pub ac_kw: f64,
    pub dc_kw: f64,
}
