use super::ParsedRow;
use crate::error::{ReadingsError, Result};

const VALUE_TOLERANCE: f64 = 1e-9;

/// Collapse each run of `repetition` identical rows into its first row.
pub(crate) fn collapse(rows: Vec<ParsedRow>, repetition: usize) -> Result<Vec<ParsedRow>> {
    if repetition <= 1 {
        return Ok(rows);
    }
    if rows.len() % repetition != 0 {
        let row = rows.last().map_or(0, |r| r.row);
        return Err(ReadingsError::Repetition {
            row,
            reason: format!("{} rows do not divide into groups of {repetition}", rows.len()),
        });
    }

    rows.chunks(repetition)
        .map(|group| {
            let first = group[0];
            for other in &group[1..] {
                if other.start != first.start || other.end != first.end {
                    return Err(ReadingsError::Repetition {
                        row: other.row,
                        reason: format!("timestamps differ from row {}", first.row),
                    });
                }
                if !values_agree(first.value, other.value) {
                    return Err(ReadingsError::Repetition {
                        row: other.row,
                        reason: format!("value {} differs from {} in row {}", other.value, first.value, first.row),
                    });
                }
            }
            Ok(first)
        })
        .collect()
}

fn values_agree(a: f64, b: f64) -> bool {
    (a - b).abs() <= VALUE_TOLERANCE * a.abs().max(b.abs())
}
