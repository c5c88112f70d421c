use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use summary_service::{
    catchup::CatchUpController,
    config::AppConfig,
    curve::CurveBuilder,
    http,
    metrics_server,
    observability,
    query::QueryService,
    scheduler::Scheduler,
    store::PgStore,
    summarizer::DailySummarizer,
    warmer::CacheWarmer,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let local_offset = cfg.local_offset()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = Arc::new(PgStore::new(pool));

    // Scheduled chain: catch-up summarizer, cache warmer, retention sweep.
    let summarizer = Arc::new(DailySummarizer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        CurveBuilder::new(store.clone(), cfg.summary.curve_max_points),
        cfg.summary.reading_tables.clone(),
        local_offset,
        cfg.summary.fetch_concurrency,
    ));
    let catchup = CatchUpController::new(summarizer, cfg.summary.catch_up_max_days);
    let warmer = CacheWarmer::new(
        store.clone(),
        store.clone(),
        store.clone(),
        cfg.cache.retention_days,
    );
    let scheduler = Scheduler::new(
        catchup,
        warmer,
        local_offset,
        Duration::from_secs(cfg.summary.run_interval_seconds),
    );
    tokio::spawn(scheduler.run());

    // On-demand read path.
    let query = Arc::new(QueryService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        local_offset,
        cfg.cache.ttl_seconds,
    ));
    let state = http::AppState::new(
        query,
        store.clone(),
        store.clone(),
        cfg.summary.reading_tables.clone(),
    );
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.http.bind_addr).await?;
    tracing::info!(addr = %cfg.http.bind_addr, "query service listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
