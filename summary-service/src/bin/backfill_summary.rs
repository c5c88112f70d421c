//! Explicit backfill path for gaps the catch-up controller will not replay:
//! re-runs the daily summarizer over an inclusive local-date range.

use anyhow::{bail, Result};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};
use summary_service::{
    config::AppConfig,
    curve::CurveBuilder,
    observability,
    store::PgStore,
    summarizer::{DailySummarizer, SummarizeDay},
};
use time::{format_description::BorrowedFormatItem, macros::format_description, Date, Duration};

const DAY_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: backfill_summary <start YYYY-MM-DD> <end YYYY-MM-DD>");
    }
    let start = Date::parse(&args[1], DAY_FORMAT)?;
    let end = Date::parse(&args[2], DAY_FORMAT)?;
    if end < start {
        bail!("end date {end} precedes start date {start}");
    }

    // Load configuration (can point SUMMARY_CONFIG to a backfill-specific file).
    let cfg = AppConfig::load()?;
    let local_offset = cfg.local_offset()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgStore::new(pool));

    let summarizer = DailySummarizer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        CurveBuilder::new(store.clone(), cfg.summary.curve_max_points),
        cfg.summary.reading_tables.clone(),
        local_offset,
        cfg.summary.fetch_concurrency,
    );

    let mut day = start;
    while day <= end {
        tracing::info!(day = %day, "backfill summarize");
        let upserts = summarizer.summarize_day(day).await?;
        tracing::info!(day = %day, upserts, "backfill day complete");
        day += Duration::days(1);
    }

    Ok(())
}
