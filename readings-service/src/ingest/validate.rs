use time::format_description::well_known::Rfc3339;

use super::TimedRow;
use crate::error::{ReadingsError, Result};

/// Tolerances a meter's reading sequence must respect, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceLimits {
    pub max_gap_secs: f64,
    /// Expected reading length; zero disables the length check.
    pub frequency_secs: f64,
    pub max_variation_secs: f64,
}

/// Check ordering, gaps and reading lengths of time-sorted rows.
pub(crate) fn check_sequence(rows: &[TimedRow], limits: SequenceLimits) -> Result<()> {
    let mut previous_end = None;

    for row in rows {
        if row.start >= row.end {
            let value = row.end.format(&Rfc3339).unwrap_or_default();
            return Err(ReadingsError::parse(row.row, "end", &value, "reading ends at or before its start"));
        }

        if let Some(previous_end) = previous_end {
            if row.start < previous_end {
                return Err(ReadingsError::ReadingOverlap {
                    row: row.row,
                    start: row.start,
                    previous_end,
                });
            }
            let gap_secs = (row.start - previous_end).as_seconds_f64();
            if gap_secs > limits.max_gap_secs {
                return Err(ReadingsError::ReadingGap {
                    row: row.row,
                    gap_secs,
                    allowed_secs: limits.max_gap_secs,
                });
            }
        }

        if limits.frequency_secs > 0.0 {
            let length_secs = (row.end - row.start).as_seconds_f64();
            if (length_secs - limits.frequency_secs).abs() > limits.max_variation_secs {
                return Err(ReadingsError::ReadingLength {
                    row: row.row,
                    length_secs,
                    expected_secs: limits.frequency_secs,
                    allowed_secs: limits.max_variation_secs,
                });
            }
        }

        previous_end = Some(row.end);
    }
    Ok(())
}
