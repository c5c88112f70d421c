use anyhow::{bail, Result};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::RawReading;

/// Fetch all readings from one source table whose timestamp falls in
/// `[from, until)`, in chronological order. Each inverter model family lands
/// in its own table, so the table name is part of the query surface; it comes
/// from configuration, not from request input.
pub async fn readings_in_window(
    pool: &PgPool,
    table: &str,
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> Result<Vec<RawReading>> {
    ensure_ident(table)?;

    let sql = format!(
        r#"
        SELECT
            ts,
            device_id,
            ac_power_kw,
            dc_power_kw,
            daily_yield,
            daily_yield_unit,
            monthly_yield,
            monthly_yield_unit,
            total_yield,
            total_yield_unit
        FROM {table}
        WHERE ts >= $1
          AND ts <  $2
        ORDER BY ts
        "#
    );

    let rows = sqlx::query_as::<_, RawReading>(&sql)
        .bind(from)
        .bind(until)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

fn ensure_ident(table: &str) -> Result<()> {
    let ok = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !ok {
        bail!("invalid reading table name: {table:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_check_accepts_plain_table_names() {
        assert!(ensure_ident("sungrow_inverter_125kw").is_ok());
        assert!(ensure_ident("SungrowInverter100KW").is_ok());
    }

    #[test]
    fn ident_check_rejects_punctuation() {
        assert!(ensure_ident("readings; DROP TABLE x").is_err());
        assert!(ensure_ident("").is_err());
    }
}
