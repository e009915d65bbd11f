//! Current period versus the same period shifted back in time.

mod alignment;
mod shift;

use readings_client::domain::IntervalError;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

pub use alignment::{alignment_notes, AlignmentNote};
pub use shift::Shift;

use crate::{
    aggregate::{bar, floor_to, reject_raw, MeterSeries},
    error::Result,
};

/// The two whole-hour periods being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparePeriods {
    pub current: (OffsetDateTime, OffsetDateTime),
    pub shifted: (OffsetDateTime, OffsetDateTime),
}

impl ComparePeriods {
    pub fn new(current_start: OffsetDateTime, current_end: OffsetDateTime, shift: Shift) -> Result<Self> {
        if current_start > current_end {
            return Err(IntervalError::StartAfterEnd {
                start: current_start,
                end: current_end,
            }
            .into());
        }
        let shifted = (shift.subtract_from(current_start)?, shift.subtract_from(current_end)?);
        Ok(Self {
            current: whole_hours(current_start, current_end),
            shifted: whole_hours(shifted.0, shifted.1),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompareTotals {
    pub shifted_total: f64,
    pub current_total: f64,
}

/// Line series of both periods with advisory notes on how their points line up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareLines {
    pub shifted: crate::query::LineSeries,
    pub current: crate::query::LineSeries,
    pub notes: Vec<AlignmentNote>,
}

/// Converted quantity over `[start, end)`; zero when nothing was recorded.
pub fn period_total(series: &[MeterSeries<'_>], (start, end): (OffsetDateTime, OffsetDateTime)) -> Result<f64> {
    reject_raw(series, "compare")?;
    if start >= end {
        return Ok(0.0);
    }
    Ok(bar::total(series, start, end).unwrap_or(0.0))
}

/// Start rounded up and end rounded down to whole hours; an empty result
/// collapses onto its start.
fn whole_hours(start: OffsetDateTime, end: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let floored = floor_to(start, Duration::HOUR);
    let start = if floored == start { floored } else { floored + Duration::HOUR };
    let end = floor_to(end, Duration::HOUR);
    (start, end.max(start))
}
