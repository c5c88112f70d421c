use anyhow::Result;
use sqlx::PgPool;
use time::Date;

use crate::domain::DailySummary;

/// Upsert one device-day summary with merge semantics.
///
/// Yield columns take GREATEST(existing, incoming) so a finalized day is never
/// revised downward, and two concurrent writers for the same device-day
/// converge to the same row. Plant and curve references only move from NULL to
/// a value.
pub async fn upsert_merge(pool: &PgPool, summary: &DailySummary) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO inverter_daily_summary
            (device_id, day, plant_id, total_yield_kwh, daily_yield_kwh,
             monthly_yield_kwh, curve_key, last_refreshed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (device_id, day) DO UPDATE SET
            plant_id          = COALESCE(EXCLUDED.plant_id, inverter_daily_summary.plant_id),
            total_yield_kwh   = GREATEST(EXCLUDED.total_yield_kwh, inverter_daily_summary.total_yield_kwh),
            daily_yield_kwh   = GREATEST(EXCLUDED.daily_yield_kwh, inverter_daily_summary.daily_yield_kwh),
            monthly_yield_kwh = GREATEST(EXCLUDED.monthly_yield_kwh, inverter_daily_summary.monthly_yield_kwh),
            curve_key         = COALESCE(EXCLUDED.curve_key, inverter_daily_summary.curve_key),
            last_refreshed    = EXCLUDED.last_refreshed
        "#,
    )
    .bind(&summary.device_id)
    .bind(summary.day)
    .bind(summary.plant_id)
    .bind(summary.total_yield_kwh)
    .bind(summary.daily_yield_kwh)
    .bind(summary.monthly_yield_kwh)
    .bind(&summary.curve_key)
    .bind(summary.last_refreshed)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch summaries for days in `[from, until)`, ordered by day then device.
pub async fn summaries_in_window(
    pool: &PgPool,
    from: Date,
    until: Date,
) -> Result<Vec<DailySummary>> {
    let rows = sqlx::query_as::<_, DailySummary>(
        r#"
        SELECT
            device_id,
            day,
            plant_id,
            total_yield_kwh,
            daily_yield_kwh,
            monthly_yield_kwh,
            curve_key,
            last_refreshed
        FROM inverter_daily_summary
        WHERE day >= $1
          AND day <  $2
        ORDER BY day, device_id
        "#,
    )
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch every summary row; used by the lifetime aggregation only.
pub async fn all_summaries(pool: &PgPool) -> Result<Vec<DailySummary>> {
    let rows = sqlx::query_as::<_, DailySummary>(
        r#"
        SELECT
            device_id,
            day,
            plant_id,
            total_yield_kwh,
            daily_yield_kwh,
            monthly_yield_kwh,
            curve_key,
            last_refreshed
        FROM inverter_daily_summary
        ORDER BY day, device_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
