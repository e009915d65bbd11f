//! Bar, line and range series over canonical readings.
//!
//! Every series is computed from readings already fetched for the query
//! interval and yielded lazily, bucket by bucket. Buckets without data yield
//! no point.

pub(crate) mod bar;
mod line;
mod range;

use readings_client::domain::{IntervalError, Reading, TimeInterval, UnitRepresent};
use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};

pub use bar::bar_points;
pub use line::{group_line_points, line_points, LineResolution};
pub use range::range_points;

use crate::{
    error::{ReadingsError, Result},
    units::{LinearTransform, CANONICAL_SEC_IN_RATE},
};

/// Line points a raw series may have before it is coarsened.
pub const DEFAULT_MAX_RAW_POINTS: usize = 1440;

/// Readings of one meter together with how to display them.
#[derive(Debug, Clone, Copy)]
pub struct MeterSeries<'a> {
    /// Sorted by start, non-overlapping.
    pub readings: &'a [Reading],
    /// Representation of the meter's own unit.
    pub represent: UnitRepresent,
    /// Meter unit to display unit, rate scaling included.
    pub transform: LinearTransform,
    /// Seconds in rate of the display unit.
    pub display_sec_in_rate: f64,
}

impl MeterSeries<'_> {
    /// Display value of one reading read as a rate.
    pub(crate) fn line_value(&self, reading: &Reading) -> f64 {
        let raw = match self.represent {
            UnitRepresent::Quantity => reading.value * CANONICAL_SEC_IN_RATE / reading.duration_seconds(),
            UnitRepresent::Flow | UnitRepresent::Raw => reading.value,
        };
        self.transform.apply(raw)
    }

    /// Readings sharing time with `[start, end)`.
    pub(crate) fn overlapping(&self, start: OffsetDateTime, end: OffsetDateTime) -> &[Reading] {
        let lo = self.readings.partition_point(|r| r.end_timestamp <= start);
        let hi = self.readings.partition_point(|r| r.start_timestamp < end);
        &self.readings[lo..hi.max(lo)]
    }

    /// Time-weighted mean display rate over `[start, end)`, `None` without data.
    pub(crate) fn mean_line_value(&self, start: OffsetDateTime, end: OffsetDateTime) -> Option<f64> {
        let (weighted, covered) = self
            .overlapping(start, end)
            .iter()
            .map(|r| {
                let seconds = r.overlap_seconds(start, end);
                (self.line_value(r) * seconds, seconds)
            })
            .fold((0.0, 0.0), |(v, s), (dv, ds)| (v + dv, s + ds));
        (covered > 0.0).then(|| weighted / covered)
    }

    fn first_start(&self) -> Option<OffsetDateTime> {
        self.readings.first().map(|r| r.start_timestamp)
    }

    fn last_end(&self) -> Option<OffsetDateTime> {
        self.readings.last().map(|r| r.end_timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangePoint {
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
    pub min: f64,
    pub max: f64,
}

/// Consecutive `[start, end)` buckets of one width; the last may be shorter.
#[derive(Debug, Clone)]
pub struct Buckets {
    next: OffsetDateTime,
    end: OffsetDateTime,
    width: Duration,
}

impl Buckets {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime, width: Duration) -> Self {
        Self { next: start, end, width }
    }
}

impl Iterator for Buckets {
    type Item = (OffsetDateTime, OffsetDateTime);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end || self.width <= Duration::ZERO {
            return None;
        }
        let start = self.next;
        let end = (start + self.width).min(self.end);
        self.next = end;
        Some((start, end))
    }
}

/// Concrete `[start, end)` of a query, open sides taken from the data.
///
/// `None` when there is nothing to cover.
pub fn resolve_span(series: &[MeterSeries<'_>], interval: &TimeInterval) -> Option<(OffsetDateTime, OffsetDateTime)> {
    let start = interval
        .start()
        .or_else(|| series.iter().filter_map(MeterSeries::first_start).min())?;
    let end = interval
        .end()
        .or_else(|| series.iter().filter_map(MeterSeries::last_end).max())?;
    (start < end).then_some((start, end))
}

pub(crate) fn bucket_width(days: u32) -> Result<Duration> {
    if days == 0 {
        return Err(IntervalError::Malformed("bucket width must be at least one day".into()).into());
    }
    Ok(Duration::days(i64::from(days)))
}

/// Raw samples such as temperatures cannot be summed into buckets.
pub(crate) fn reject_raw(series: &[MeterSeries<'_>], mode: &'static str) -> Result<()> {
    if series.iter().any(|s| s.represent == UnitRepresent::Raw) {
        return Err(ReadingsError::UnsupportedMode {
            mode,
            subject: "raw units".into(),
        });
    }
    Ok(())
}

/// Largest multiple of `step` since the epoch not after `ts`, in UTC.
pub(crate) fn floor_to(ts: OffsetDateTime, step: Duration) -> OffsetDateTime {
    let ts = ts.to_offset(UtcOffset::UTC);
    let step_secs = step.whole_seconds().max(1);
    ts - Duration::seconds(ts.unix_timestamp().rem_euclid(step_secs)) - Duration::nanoseconds(i64::from(ts.nanosecond()))
}
