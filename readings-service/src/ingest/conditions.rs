use serde::Deserialize;
use time::OffsetDateTime;

use super::TimedRow;
use crate::error::{ReadingsError, Result};

fn default_max_errors() -> usize {
    75
}

/// Bounds every reading of an upload must fall within.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionSet {
    pub min_val: Option<f64>,
    pub max_val: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub min_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub max_date: Option<OffsetDateTime>,
    /// Upper bound on the messages reported.
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
}

impl Default for ConditionSet {
    fn default() -> Self {
        Self {
            min_val: None,
            max_val: None,
            min_date: None,
            max_date: None,
            max_errors: default_max_errors(),
        }
    }
}

impl ConditionSet {
    pub(crate) fn check(&self, rows: &[TimedRow]) -> Result<()> {
        let mut messages = Vec::new();
        let mut violations = 0usize;

        for row in rows {
            for message in self.violations(row) {
                violations += 1;
                if messages.len() < self.max_errors {
                    messages.push(message);
                }
            }
        }

        if violations == 0 {
            return Ok(());
        }
        if violations > messages.len() {
            messages.push(format!("{} further violations not shown", violations - messages.len()));
        }
        Err(ReadingsError::Condition { messages })
    }

    fn violations(&self, row: &TimedRow) -> impl Iterator<Item = String> {
        let below = self
            .min_val
            .filter(|&min| row.value < min)
            .map(|min| format!("row {}: value {} below minimum {min}", row.row, row.value));
        let above = self
            .max_val
            .filter(|&max| row.value > max)
            .map(|max| format!("row {}: value {} above maximum {max}", row.row, row.value));
        let early = self
            .min_date
            .filter(|&min| row.start < min)
            .map(|min| format!("row {}: starts {} before {min}", row.row, row.start));
        let late = self
            .max_date
            .filter(|&max| row.end > max)
            .map(|max| format!("row {}: ends {} after {max}", row.row, row.end));
        [below, above, early, late].into_iter().flatten()
    }
}
