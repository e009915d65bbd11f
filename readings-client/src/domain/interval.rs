use std::{fmt, str::FromStr};

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval start {start} is after end {end}")]
    StartAfterEnd { start: OffsetDateTime, end: OffsetDateTime },
    #[error("malformed time interval '{0}'")]
    Malformed(String),
}

/// A time range where either side may be unbounded.
///
/// The textual form is `"<start>_<end>"` with RFC 3339 bounds, an empty side
/// for an open bound, and `"all"` for eternity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInterval {
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
}

impl TimeInterval {
    pub fn new(start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Result<Self, IntervalError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(IntervalError::StartAfterEnd { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn bounded(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, IntervalError> {
        Self::new(Some(start), Some(end))
    }

    pub const fn unbounded() -> Self {
        Self { start: None, end: None }
    }

    pub const fn start(&self) -> Option<OffsetDateTime> {
        self.start
    }

    pub const fn end(&self) -> Option<OffsetDateTime> {
        self.end
    }

    pub const fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Whether `[start, end)` shares any time with this interval.
    pub fn overlaps(&self, start: OffsetDateTime, end: OffsetDateTime) -> bool {
        self.start.map_or(true, |s| end > s) && self.end.map_or(true, |e| start < e)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.is_none() && self.end.is_none() {
            return f.write_str("all");
        }
        let side = |ts: Option<OffsetDateTime>| {
            ts.and_then(|ts| ts.format(&Rfc3339).ok()).unwrap_or_default()
        };
        write!(f, "{}_{}", side(self.start), side(self.end))
    }
}

impl FromStr for TimeInterval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "all" {
            return Ok(Self::unbounded());
        }
        let (start, end) = s
            .split_once('_')
            .ok_or_else(|| IntervalError::Malformed(s.to_string()))?;
        let parse = |side: &str| -> Result<Option<OffsetDateTime>, IntervalError> {
            if side.is_empty() {
                Ok(None)
            } else {
                OffsetDateTime::parse(side, &Rfc3339)
                    .map(Some)
                    .map_err(|_| IntervalError::Malformed(s.to_string()))
            }
        };
        Self::new(parse(start)?, parse(end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rejects_reversed_bounds() {
        let res = TimeInterval::bounded(datetime!(2024-01-02 00:00:00 UTC), datetime!(2024-01-01 00:00:00 UTC));
        assert!(matches!(res, Err(IntervalError::StartAfterEnd { .. })));
    }

    #[test]
    fn parses_textual_forms() {
        assert_eq!("all".parse::<TimeInterval>().unwrap(), TimeInterval::unbounded());

        let open_end: TimeInterval = "2022-10-31T00:00:00Z_".parse().unwrap();
        assert_eq!(open_end.start(), Some(datetime!(2022-10-31 00:00:00 UTC)));
        assert_eq!(open_end.end(), None);

        let bounded: TimeInterval = "2022-10-31T00:00:00Z_2022-11-01T00:00:00Z".parse().unwrap();
        assert!(bounded.is_bounded());
        assert_eq!(bounded.to_string(), "2022-10-31T00:00:00Z_2022-11-01T00:00:00Z");

        assert!(matches!("yesterday".parse::<TimeInterval>(), Err(IntervalError::Malformed(_))));
    }

    #[test]
    fn open_sides_overlap_everything() {
        let interval = TimeInterval::new(Some(datetime!(2024-01-01 00:00:00 UTC)), None).unwrap();
        assert!(interval.overlaps(datetime!(2030-01-01 00:00:00 UTC), datetime!(2030-01-02 00:00:00 UTC)));
        assert!(!interval.overlaps(datetime!(2023-12-31 00:00:00 UTC), datetime!(2024-01-01 00:00:00 UTC)));
    }
}
