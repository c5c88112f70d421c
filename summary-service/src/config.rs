use serde::Deserialize;
use std::fs;
use time::UtcOffset;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    /// Civil time zone of the plants, as a fixed offset from UTC in minutes.
    /// Local midnight in this zone is the day boundary for every aggregate.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Raw-reading source tables, one per inverter model family.
    pub reading_tables: Vec<String>,
    /// Bounded fan-out for concurrent source fetches within one pass.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Longest gap (in calendar days) the catch-up controller will replay
    /// inside one scheduled invocation. Larger gaps need the backfill binary.
    #[serde(default = "default_catch_up_max_days")]
    pub catch_up_max_days: i64,
    /// Point budget for one device-day curve artifact.
    #[serde(default = "default_curve_max_points")]
    pub curve_max_points: usize,
    /// Scheduled-run interval in seconds.
    #[serde(default = "default_run_interval_seconds")]
    pub run_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Read-through freshness bound for day/week entries.
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: i64,
    /// Storage-growth bound: entries older than this are swept regardless of
    /// read freshness.
    #[serde(default = "default_cache_retention_days")]
    pub retention_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub summary: SummaryConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("SUMMARY_CONFIG").unwrap_or_else(|_| "summary-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        cfg.local_offset()?;
        Ok(cfg)
    }

    pub fn local_offset(&self) -> anyhow::Result<UtcOffset> {
        UtcOffset::from_whole_seconds(self.summary.utc_offset_minutes * 60)
            .map_err(|e| anyhow::anyhow!("invalid summary.utc_offset_minutes: {e}"))
    }
}

// Defaults follow the reference deployment: IST plants, a 20-minute timer,
// a 60s live-query TTL, and a 7-day cache retention sweep.
fn default_utc_offset_minutes() -> i32 {
    330
}
fn default_fetch_concurrency() -> usize {
    4
}
fn default_catch_up_max_days() -> i64 {
    3
}
fn default_curve_max_points() -> usize {
    200
}
fn default_run_interval_seconds() -> u64 {
    1200
}
fn default_cache_ttl_seconds() -> i64 {
    60
}
fn default_cache_retention_days() -> i64 {
    7
}
