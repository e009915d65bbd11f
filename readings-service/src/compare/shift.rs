use std::str::FromStr;

use time::{Duration, Month, OffsetDateTime};

use crate::error::{ReadingsError, Result};

/// A calendar-aware ISO-8601 duration such as `P1M` or `P1DT12H`.
///
/// Years and months move along the calendar and clamp to the end of shorter
/// months; weeks, days and the time part are fixed lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shift {
    months: i64,
    days: i64,
    time: Duration,
}

impl Shift {
    pub const fn days(days: i64) -> Self {
        Self {
            months: 0,
            days,
            time: Duration::ZERO,
        }
    }

    pub const fn months(months: i64) -> Self {
        Self {
            months,
            days: 0,
            time: Duration::ZERO,
        }
    }

    /// `ts` moved back by this shift.
    pub fn subtract_from(self, ts: OffsetDateTime) -> Result<OffsetDateTime> {
        let out_of_range = || ReadingsError::InvalidShift(format!("shifting {ts} leaves the supported range"));

        let date = ts.date();
        let month_index = (i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1)
            .checked_sub(self.months)
            .ok_or_else(out_of_range)?;
        let year = i32::try_from(month_index.div_euclid(12)).map_err(|_| out_of_range())?;
        let month = u8::try_from(month_index.rem_euclid(12) + 1)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(out_of_range)?;
        let day = date.day().min(month.length(year));

        let moved = ts
            .replace_day(1)
            .and_then(|t| t.replace_year(year))
            .and_then(|t| t.replace_month(month))
            .and_then(|t| t.replace_day(day))
            .map_err(|_| out_of_range())?;

        fixed_length(self.days, SECONDS_PER_DAY)
            .and_then(|days| moved.checked_sub(days))
            .and_then(|t| t.checked_sub(self.time))
            .ok_or_else(out_of_range)
    }
}

impl FromStr for Shift {
    type Err = ReadingsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ReadingsError::InvalidShift(s.to_string());
        let body = s.trim().strip_prefix('P').ok_or_else(invalid)?;
        let (date_part, time_part) = match body.split_once('T') {
            Some((_, "")) => return Err(invalid()),
            Some((date, time)) => (date, Some(time)),
            None => (body, None),
        };
        if date_part.is_empty() && time_part.is_none() {
            return Err(invalid());
        }

        let mut shift = Self::default();
        for (amount, designator) in designators(date_part).ok_or_else(invalid)? {
            let (field, unit) = match designator {
                'Y' => (&mut shift.months, 12),
                'M' => (&mut shift.months, 1),
                'W' => (&mut shift.days, 7),
                'D' => (&mut shift.days, 1),
                _ => return Err(invalid()),
            };
            let current = *field;
            *field = amount
                .checked_mul(unit)
                .and_then(|n| current.checked_add(n))
                .ok_or_else(invalid)?;
        }
        for (amount, designator) in designators(time_part.unwrap_or_default()).ok_or_else(invalid)? {
            let seconds_per_unit = match designator {
                'H' => 3_600,
                'M' => 60,
                'S' => 1,
                _ => return Err(invalid()),
            };
            shift.time = fixed_length(amount, seconds_per_unit)
                .and_then(|d| shift.time.checked_add(d))
                .ok_or_else(invalid)?;
        }
        Ok(shift)
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

/// `amount` units of `seconds_per_unit` seconds, `None` on overflow.
fn fixed_length(amount: i64, seconds_per_unit: i64) -> Option<Duration> {
    amount.checked_mul(seconds_per_unit).map(Duration::seconds)
}

/// Split `"1Y2M"` into `[(1, 'Y'), (2, 'M')]`.
fn designators(part: &str) -> Option<Vec<(i64, char)>> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.is_empty() {
                return None;
            }
            out.push((digits.parse().ok()?, c));
            digits.clear();
        }
    }
    digits.is_empty().then_some(out)
}
