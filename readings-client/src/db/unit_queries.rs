use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{Conversion, GroupId, Meter, MeterId, Unit};

pub async fn fetch_units(pool: &PgPool) -> Result<Vec<Unit>> {
    let rows = sqlx::query_as::<_, Unit>(
        r#"
        SELECT
            id,
            name,
            identifier,
            unit_represent,
            sec_in_rate,
            type_of_unit,
            suffix,
            displayable,
            preferred_display,
            note
        FROM units
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Conversions in insertion order; path search breaks ties on this order.
pub async fn fetch_conversions(pool: &PgPool) -> Result<Vec<Conversion>> {
    let rows = sqlx::query_as::<_, Conversion>(
        r#"
        SELECT
            source_id,
            destination_id,
            bidirectional,
            slope,
            intercept,
            note
        FROM conversions
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

const METER_COLUMNS: &str = r#"
    id,
    name,
    unit_id,
    default_graphic_unit,
    reading_frequency_secs,
    cumulative,
    cumulative_reset,
    cumulative_reset_start,
    cumulative_reset_end,
    reading_gap_secs,
    reading_variation_secs,
    reading_duplication,
    time_sort,
    end_only_time,
    time_zone
"#;

pub async fn fetch_meters(pool: &PgPool) -> Result<Vec<Meter>> {
    let sql = format!("SELECT {METER_COLUMNS} FROM meters ORDER BY id");
    let rows = sqlx::query_as::<_, Meter>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub async fn fetch_meter(pool: &PgPool, meter_id: MeterId) -> Result<Option<Meter>> {
    let sql = format!("SELECT {METER_COLUMNS} FROM meters WHERE id = $1");
    let row = sqlx::query_as::<_, Meter>(&sql)
        .bind(meter_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Every meter below `group_id`, child groups expanded recursively.
///
/// Returns `None` when the group does not exist.
pub async fn fetch_group_meters(pool: &PgPool, group_id: GroupId) -> Result<Option<Vec<MeterId>>> {
    let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM groups WHERE id = $1")
        .bind(group_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    let meters: Vec<MeterId> = sqlx::query_scalar(
        r#"
        WITH RECURSIVE member_groups(id) AS (
            SELECT $1::int
            UNION
            SELECT gc.child_id
            FROM groups_immediate_children gc
            JOIN member_groups mg ON gc.parent_id = mg.id
        )
        SELECT DISTINCT gm.meter_id
        FROM groups_immediate_meters gm
        JOIN member_groups mg ON gm.group_id = mg.id
        ORDER BY gm.meter_id
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(meters))
}
