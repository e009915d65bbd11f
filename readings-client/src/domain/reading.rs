use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::MeterId;

/// A canonical interval reading of one meter.
///
/// `value` is whatever the meter's unit represents: an amount for quantity
/// units, a rate for flow units, a sample for raw units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub meter_id: MeterId,
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
    #[sqlx(rename = "reading")]
    pub value: f64,
}

impl Reading {
    pub fn duration(&self) -> Duration {
        self.end_timestamp - self.start_timestamp
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration().as_seconds_f64()
    }

    /// Seconds of this reading that fall inside `[start, end)`, zero when disjoint.
    pub fn overlap_seconds(&self, start: OffsetDateTime, end: OffsetDateTime) -> f64 {
        let lo = self.start_timestamp.max(start);
        let hi = self.end_timestamp.min(end);
        if hi > lo {
            (hi - lo).as_seconds_f64()
        } else {
            0.0
        }
    }

    pub fn overlaps(&self, start: OffsetDateTime, end: OffsetDateTime) -> bool {
        self.start_timestamp < end && self.end_timestamp > start
    }
}

/// Merge freshly normalized readings into the stored readings of one meter.
///
/// With `should_update` every stored reading overlapping the window spanned by
/// `incoming` is dropped and replaced. Without it stored readings win and any
/// incoming reading overlapping one of them is skipped, so loading the same
/// batch twice leaves the stored set unchanged.
///
/// Both inputs must be sorted by start timestamp; the result is too.
pub fn merge_readings(existing: &[Reading], incoming: &[Reading], should_update: bool) -> Vec<Reading> {
    let (Some(first), Some(last)) = (incoming.first(), incoming.last()) else {
        return existing.to_vec();
    };

    let mut merged: Vec<Reading> = if should_update {
        let window_start = first.start_timestamp;
        let window_end = last.end_timestamp;
        existing
            .iter()
            .filter(|r| !r.overlaps(window_start, window_end))
            .copied()
            .chain(incoming.iter().copied())
            .collect()
    } else {
        let fresh = incoming.iter().filter(|candidate| {
            // Stored readings never overlap each other, so their ends are sorted too and the
            // last one starting before the candidate ends is the only one that can reach into it.
            let upper = existing.partition_point(|r| r.start_timestamp < candidate.end_timestamp);
            upper == 0 || existing[upper - 1].end_timestamp <= candidate.start_timestamp
        });
        existing.iter().copied().chain(fresh.copied()).collect()
    };

    merged.sort_by_key(|r| r.start_timestamp);
    merged
}
