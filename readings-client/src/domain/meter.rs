use serde::{Deserialize, Serialize};
use time::{Duration, Time};

use super::{MeterId, UnitId};

/// Declared time order of the rows in an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "time_sort_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TimeSort {
    #[default]
    Increasing,
    Decreasing,
    Unknown,
}

/// A meter and the ingestion defaults stored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Meter {
    pub id: MeterId,
    pub name: String,
    pub unit_id: UnitId,
    pub default_graphic_unit: Option<UnitId>,
    pub reading_frequency_secs: i64,
    pub cumulative: bool,
    pub cumulative_reset: bool,
    pub cumulative_reset_start: Time,
    pub cumulative_reset_end: Time,
    pub reading_gap_secs: f64,
    pub reading_variation_secs: f64,
    pub reading_duplication: i32,
    pub time_sort: TimeSort,
    pub end_only_time: bool,
    pub time_zone: Option<String>,
}

impl Meter {
    pub fn reading_frequency(&self) -> Duration {
        Duration::seconds(self.reading_frequency_secs)
    }
}
