use anyhow::Result;
use sqlx::PgPool;

use crate::{
    db::{reading_queries, unit_queries},
    domain::{Conversion, GroupId, Meter, MeterId, Reading, TimeInterval, Unit},
};

/// The narrow storage interface the aggregation core reads and writes through.
#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    /// Readings of `meter_id` overlapping `interval`, ordered by start timestamp.
    async fn fetch_canonical_readings(&self, meter_id: MeterId, interval: TimeInterval) -> Result<Vec<Reading>>;

    async fn fetch_units(&self) -> Result<Vec<Unit>>;

    /// Conversions in insertion order.
    async fn fetch_conversions(&self) -> Result<Vec<Conversion>>;

    async fn fetch_meters(&self) -> Result<Vec<Meter>>;

    async fn fetch_meter(&self, meter_id: MeterId) -> Result<Option<Meter>>;

    /// Deep member meters of a group, `None` if the group is unknown.
    async fn fetch_group_meters(&self, group_id: GroupId) -> Result<Option<Vec<MeterId>>>;

    /// Atomically store a normalized batch; returns the number of readings written.
    async fn replace_canonical_readings(&self, meter_id: MeterId, readings: &[Reading], should_update: bool) -> Result<u64>;
}

#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgReadingStore {
    async fn fetch_canonical_readings(&self, meter_id: MeterId, interval: TimeInterval) -> Result<Vec<Reading>> {
        reading_queries::fetch_canonical_readings(&self.pool, meter_id, interval).await
    }

    async fn fetch_units(&self) -> Result<Vec<Unit>> {
        unit_queries::fetch_units(&self.pool).await
    }

    async fn fetch_conversions(&self) -> Result<Vec<Conversion>> {
        unit_queries::fetch_conversions(&self.pool).await
    }

    async fn fetch_meters(&self) -> Result<Vec<Meter>> {
        unit_queries::fetch_meters(&self.pool).await
    }

    async fn fetch_meter(&self, meter_id: MeterId) -> Result<Option<Meter>> {
        unit_queries::fetch_meter(&self.pool, meter_id).await
    }

    async fn fetch_group_meters(&self, group_id: GroupId) -> Result<Option<Vec<MeterId>>> {
        unit_queries::fetch_group_meters(&self.pool, group_id).await
    }

    async fn replace_canonical_readings(&self, meter_id: MeterId, readings: &[Reading], should_update: bool) -> Result<u64> {
        reading_queries::replace_canonical_readings(&self.pool, meter_id, readings, should_update).await
    }
}
