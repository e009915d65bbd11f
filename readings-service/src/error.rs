use readings_client::domain::{ConversionError, GroupId, IntervalError, MeterId, UnitError, UnitId};
use time::OffsetDateTime;

/// Failures of the aggregation core.
///
/// Ingestion variants abort the whole batch; query variants are surfaced to
/// the caller so it can render "incompatible unit" or "no data".
#[derive(thiserror::Error, Debug)]
pub enum ReadingsError {
    #[error("row {row}: invalid {field} '{value}': {reason}")]
    Parse {
        row: usize,
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("row {row}: gap of {gap_secs}s before reading exceeds the allowed {allowed_secs}s")]
    ReadingGap { row: usize, gap_secs: f64, allowed_secs: f64 },
    #[error("row {row}: reading length {length_secs}s differs from the expected {expected_secs}s by more than {allowed_secs}s")]
    ReadingLength {
        row: usize,
        length_secs: f64,
        expected_secs: f64,
        allowed_secs: f64,
    },
    #[error("row {row}: reading starting {start} overlaps the previous reading ending {previous_end}")]
    ReadingOverlap {
        row: usize,
        start: OffsetDateTime,
        previous_end: OffsetDateTime,
    },
    #[error("row {row}: repeated rows disagree: {reason}")]
    Repetition { row: usize, reason: String },
    #[error("row {row}: cumulative value dropped from {previous} to {current} outside the reset window")]
    CumulativeReset { row: usize, previous: f64, current: f64 },
    #[error("readings violate the meter conditions: {}", messages.join("; "))]
    Condition { messages: Vec<String> },
    #[error("no conversion path from unit {source_id} to unit {destination_id}")]
    NoConversionPath { source_id: UnitId, destination_id: UnitId },
    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),
    #[error("{mode} series are not available for {subject}")]
    UnsupportedMode { mode: &'static str, subject: String },
    #[error("invalid conversion: {0}")]
    InvalidConversion(#[from] ConversionError),
    #[error("invalid unit: {0}")]
    InvalidUnit(#[from] UnitError),
    #[error("unknown meter {0}")]
    UnknownMeter(MeterId),
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),
    #[error("invalid shift '{0}', expected an ISO-8601 duration such as P1D")]
    InvalidShift(String),
    #[error("unit graph snapshot {seen} used after invalidation to generation {current}")]
    StaleCache { seen: u64, current: u64 },
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ReadingsError {
    pub fn parse(row: usize, field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            row,
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ReadingsError> = std::result::Result<T, E>;
