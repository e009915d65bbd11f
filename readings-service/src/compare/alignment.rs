use serde::Serialize;
use time::OffsetDateTime;

/// Advisory observations about a current line and its shifted counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentNote {
    /// Points will not line up one to one.
    PointCountMismatch { current: usize, shifted: usize },
    /// The shifted line runs into the current one.
    Overlap {
        #[serde(with = "time::serde::rfc3339")]
        from: OffsetDateTime,
    },
    WeekdaysAlign,
    /// Month and day of month match, up to the first current point where they stop matching.
    MonthDaysAlign {
        #[serde(with = "time::serde::rfc3339::option")]
        until: Option<OffsetDateTime>,
    },
}

/// Compare the point timestamps of a current and a shifted line series.
pub fn alignment_notes(current: &[OffsetDateTime], shifted: &[OffsetDateTime]) -> Vec<AlignmentNote> {
    let (Some(&current_first), Some(&shifted_first), Some(&shifted_last)) =
        (current.first(), shifted.first(), shifted.last())
    else {
        return Vec::new();
    };

    let mut notes = Vec::new();
    let same_count = current.len() == shifted.len();
    if !same_count {
        notes.push(AlignmentNote::PointCountMismatch {
            current: current.len(),
            shifted: shifted.len(),
        });
    }

    if shifted_last > current_first {
        notes.push(AlignmentNote::Overlap { from: current_first });
    }

    if same_count && current_first.weekday() == shifted_first.weekday() {
        notes.push(AlignmentNote::WeekdaysAlign);
    }

    if same_count && month_day_same(current_first, shifted_first) {
        let until = current
            .iter()
            .zip(shifted)
            .skip(1)
            .find(|&(c, s)| !month_day_same(*c, *s))
            .map(|(c, _)| *c);
        notes.push(AlignmentNote::MonthDaysAlign { until });
    }

    notes
}

fn month_day_same(a: OffsetDateTime, b: OffsetDateTime) -> bool {
    a.month() == b.month() && a.day() == b.day()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration};

    fn daily(start: OffsetDateTime, days: i64) -> Vec<OffsetDateTime> {
        (0..days).map(|d| start + Duration::days(d)).collect()
    }

    #[test]
    fn week_shift_aligns_weekdays() {
        let current = daily(datetime!(2022-10-10 00:00 UTC), 7);
        let shifted = daily(datetime!(2022-10-03 00:00 UTC), 7);
        assert_eq!(alignment_notes(&current, &shifted), vec![AlignmentNote::WeekdaysAlign]);
    }

    #[test]
    fn year_shift_aligns_month_days_until_leap_day() {
        let current = daily(datetime!(2024-02-27 00:00 UTC), 4);
        let shifted = daily(datetime!(2023-02-27 00:00 UTC), 4);
        let notes = alignment_notes(&current, &shifted);
        assert!(notes.contains(&AlignmentNote::MonthDaysAlign {
            until: Some(datetime!(2024-02-29 00:00 UTC))
        }));
    }

    #[test]
    fn mismatch_and_overlap_are_reported() {
        let current = daily(datetime!(2022-10-10 00:00 UTC), 7);
        let shifted = daily(datetime!(2022-10-06 00:00 UTC), 6);
        assert_eq!(
            alignment_notes(&current, &shifted),
            vec![
                AlignmentNote::PointCountMismatch { current: 7, shifted: 6 },
                AlignmentNote::Overlap {
                    from: datetime!(2022-10-10 00:00 UTC)
                },
            ]
        );
        assert!(alignment_notes(&current, &[]).is_empty());
    }
}
