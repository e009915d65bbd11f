use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::domain::{MeterId, Reading, TimeInterval};

/// Fetch the canonical readings of one meter that overlap `interval`, ordered by start.
pub async fn fetch_canonical_readings(pool: &PgPool, meter_id: MeterId, interval: TimeInterval) -> Result<Vec<Reading>> {
    let rows = sqlx::query_as::<_, Reading>(
        r#"
        SELECT
            meter_id,
            reading,
            start_timestamp,
            end_timestamp
        FROM readings
        WHERE meter_id = $1
          AND ($2::timestamptz IS NULL OR end_timestamp > $2)
          AND ($3::timestamptz IS NULL OR start_timestamp < $3)
        ORDER BY start_timestamp
        "#,
    )
    .bind(meter_id)
    .bind(interval.start())
    .bind(interval.end())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Store a normalized batch in a single transaction.
///
/// With `should_update` the stored readings overlapping the batch window are
/// deleted first; otherwise batch readings overlapping stored ones are skipped.
pub async fn replace_canonical_readings(
    pool: &PgPool,
    meter_id: MeterId,
    readings: &[Reading],
    should_update: bool,
) -> Result<u64> {
    let (Some(first), Some(last)) = (readings.first(), readings.last()) else {
        return Ok(0);
    };

    let mut tx = pool.begin().await?;

    if should_update {
        let deleted = delete_window(&mut tx, meter_id, first.start_timestamp, last.end_timestamp).await?;
        tracing::debug!(meter_id, deleted, "replacing stored readings in upload window");
    }

    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
    let starts: Vec<OffsetDateTime> = readings.iter().map(|r| r.start_timestamp).collect();
    let ends: Vec<OffsetDateTime> = readings.iter().map(|r| r.end_timestamp).collect();

    // The overlap guard turns a repeated upload into a no-op instead of duplicating readings.
    let inserted = sqlx::query(
        r#"
        INSERT INTO readings (meter_id, reading, start_timestamp, end_timestamp)
        SELECT $1, r.reading, r.start_timestamp, r.end_timestamp
        FROM UNNEST($2::float8[], $3::timestamptz[], $4::timestamptz[])
            AS r(reading, start_timestamp, end_timestamp)
        WHERE NOT EXISTS (
            SELECT 1
            FROM readings e
            WHERE e.meter_id = $1
              AND e.start_timestamp < r.end_timestamp
              AND e.end_timestamp > r.start_timestamp
        )
        "#,
    )
    .bind(meter_id)
    .bind(&values)
    .bind(&starts)
    .bind(&ends)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(inserted)
}

async fn delete_window(
    tx: &mut Transaction<'_, Postgres>,
    meter_id: MeterId,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<u64> {
    let res = sqlx::query(
        r#"
        DELETE FROM readings
        WHERE meter_id = $1
          AND start_timestamp < $3
          AND end_timestamp > $2
        "#,
    )
    .bind(meter_id)
    .bind(start)
    .bind(end)
    .execute(&mut **tx)
    .await?;

    Ok(res.rows_affected())
}
