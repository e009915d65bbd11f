use time::{
    format_description::{well_known::Rfc2822, well_known::Rfc3339, BorrowedFormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, Time,
};

use crate::error::{ReadingsError, Result};

/// A parsed timestamp: either a real instant or a meter wall-clock time that
/// still has to be placed in the meter's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Instant(OffsetDateTime),
    Wall(PrimitiveDateTime),
}

impl Stamp {
    /// Ordering key used before zone resolution; wall clock is read as UTC.
    pub fn provisional(self) -> OffsetDateTime {
        match self {
            Self::Instant(ts) => ts,
            Self::Wall(wall) => wall.assume_utc(),
        }
    }
}

const STRICT_WALL: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
];

const RELAXED_WALL: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
    format_description!("[year]/[month]/[day] [hour]:[minute]"),
    format_description!("[month]/[day]/[year] [hour]:[minute]:[second]"),
    format_description!("[month]/[day]/[year] [hour]:[minute]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
];

const RELAXED_DATE: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[year]/[month]/[day]"),
    format_description!("[month]/[day]/[year]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
];

/// Parse one timestamp field of row `row`.
///
/// Strict parsing accepts RFC 3339 and ISO-like wall clock times with second
/// precision. Relaxed parsing also takes slashed and US month-first dates,
/// minute precision, bare dates and RFC 2822.
pub fn parse_stamp(row: usize, field: &'static str, raw: &str, relaxed: bool) -> Result<Stamp> {
    let text = raw.trim();

    if let Ok(ts) = OffsetDateTime::parse(text, &Rfc3339) {
        return Ok(Stamp::Instant(ts));
    }
    if let Some(wall) = first_wall(text, STRICT_WALL) {
        return Ok(Stamp::Wall(wall));
    }

    if relaxed {
        if let Some(wall) = first_wall(text, RELAXED_WALL) {
            return Ok(Stamp::Wall(wall));
        }
        if let Some(date) = RELAXED_DATE.iter().find_map(|f| Date::parse(text, f).ok()) {
            return Ok(Stamp::Wall(PrimitiveDateTime::new(date, Time::MIDNIGHT)));
        }
        if let Ok(ts) = OffsetDateTime::parse(text, &Rfc2822) {
            return Ok(Stamp::Instant(ts));
        }
    }

    let expected = if relaxed {
        "a recognizable date/time"
    } else {
        "RFC 3339 or YYYY-MM-DD HH:MM:SS"
    };
    Err(ReadingsError::parse(row, field, raw, format!("expected {expected}")))
}

fn first_wall(text: &str, formats: &[&[BorrowedFormatItem<'static>]]) -> Option<PrimitiveDateTime> {
    formats.iter().find_map(|f| PrimitiveDateTime::parse(text, f).ok())
}

/// Parse the numeric reading of row `row`.
///
/// Relaxed parsing tolerates surrounding quotes and thousands separators.
pub fn parse_value(row: usize, raw: &str, relaxed: bool) -> Result<f64> {
    let text = raw.trim();
    let cleaned;
    let candidate = if relaxed {
        cleaned = text.trim_matches('"').replace(',', "");
        cleaned.trim()
    } else {
        text
    };

    match candidate.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(ReadingsError::parse(row, "reading", raw, "value is not finite")),
        Err(e) => Err(ReadingsError::parse(row, "reading", raw, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn strict_accepts_iso_forms() {
        assert_eq!(
            parse_stamp(1, "end", "2022-10-31 17:00:00", false).unwrap(),
            Stamp::Wall(datetime!(2022-10-31 17:00:00))
        );
        assert_eq!(
            parse_stamp(1, "end", "2022-10-31T17:00:00.250", false).unwrap(),
            Stamp::Wall(datetime!(2022-10-31 17:00:00.25))
        );
        assert_eq!(
            parse_stamp(1, "end", "2022-10-31T17:00:00-05:00", false).unwrap(),
            Stamp::Instant(datetime!(2022-10-31 17:00:00).assume_offset(offset!(-5)))
        );
    }

    #[test]
    fn strict_rejects_what_relaxed_accepts() {
        for raw in ["10/31/2022 17:00", "2022/10/31 17:00:00", "2022-10-31", "1/2/2023 3:04"] {
            let err = parse_stamp(4, "start", raw, false).unwrap_err();
            assert!(matches!(err, ReadingsError::Parse { row: 4, field: "start", .. }), "{raw}");
            assert!(parse_stamp(4, "start", raw, true).is_ok(), "{raw}");
        }
        assert_eq!(
            parse_stamp(1, "end", "1/2/2023 3:04", true).unwrap(),
            Stamp::Wall(datetime!(2023-01-02 03:04:00))
        );
    }

    #[test]
    fn values_report_row_and_field() {
        assert_eq!(parse_value(2, " 12.5 ", false).unwrap(), 12.5);
        let err = parse_value(9, "1,234.5", false).unwrap_err();
        assert!(matches!(err, ReadingsError::Parse { row: 9, field: "reading", .. }));
        assert_eq!(parse_value(9, "\"1,234.5\"", true).unwrap(), 1234.5);
        assert!(parse_value(3, "NaN", true).is_err());
    }
}
