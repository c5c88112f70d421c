pub mod curve_point;
pub mod daily_summary;
pub mod directory;
pub mod raw_reading;
pub mod units;

pub use curve_point::CurvePoint;
pub use daily_summary::DailySummary;
pub use directory::{GrantRow, PlantDirectoryEntry};
pub use raw_reading::RawReading;
pub use units::{scale_total_yield, ScaledYield, YieldUnit};
