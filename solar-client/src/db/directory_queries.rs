use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{GrantRow, PlantDirectoryEntry};

/// Load the full plant directory. Slowly changing reference data; callers
/// reload it per scheduled run rather than caching it across runs.
pub async fn plant_directory(pool: &PgPool) -> Result<Vec<PlantDirectoryEntry>> {
    let rows = sqlx::query_as::<_, PlantDirectoryEntry>(
        r#"
        SELECT
            plant_id,
            plant_name,
            devices
        FROM plant_directory
        ORDER BY plant_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch the grant rows for one principal. Zero rows means no access; a row
/// with `is_admin` set grants every plant.
pub async fn grant_rows(pool: &PgPool, principal: &str) -> Result<Vec<GrantRow>> {
    let rows = sqlx::query_as::<_, GrantRow>(
        r#"
        SELECT
            plant_id,
            is_admin
        FROM user_plant_access
        WHERE principal = $1
        "#,
    )
    .bind(principal)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
