//! Turns raw uploaded rows of one meter into canonical readings.
//!
//! Stages run in a fixed order: parse, sort, collapse repeated rows, place
//! wall-clock times on the timeline, fill end-only starts, difference
//! cumulative counters, then validate the sequence and the condition set.
//! Any failure rejects the whole batch.

mod conditions;
mod cumulative;
mod dst;
mod parse;
mod repetition;
mod validate;

use readings_client::domain::{Meter, MeterId, Reading, TimeSort};
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

pub use conditions::ConditionSet;
pub use cumulative::{interval_value, ResetWindow};
pub use dst::{Floor, WallClock};
pub use parse::{parse_stamp, parse_value, Stamp};
pub use validate::SequenceLimits;

use crate::error::{ReadingsError, Result};

/// One uploaded row before interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRow {
    /// 1-based position in the upload, used in error messages.
    pub row: usize,
    pub value: String,
    pub start: Option<String>,
    pub end: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParsedRow {
    pub row: usize,
    pub value: f64,
    pub start: Option<Stamp>,
    pub end: Stamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TimedRow {
    pub row: usize,
    pub value: f64,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub meter_id: MeterId,
    pub time_sort: TimeSort,
    pub reading_repetition: usize,
    pub cumulative: bool,
    /// Window in which a cumulative counter may drop; `None` forbids resets.
    pub cumulative_reset: Option<ResetWindow>,
    pub end_only: bool,
    pub reading_frequency: Duration,
    pub max_gap_secs: f64,
    pub max_variation_secs: f64,
    pub wall_clock: WallClock,
    pub relaxed_parsing: bool,
    pub conditions: Option<ConditionSet>,
}

impl NormalizeOptions {
    /// Options from the ingestion defaults stored with `meter`.
    ///
    /// With `honor_dst` wall-clock times follow the meter's time zone, which
    /// must then be a known IANA name.
    pub fn from_meter(meter: &Meter, honor_dst: bool, relaxed_parsing: bool) -> Result<Self> {
        let wall_clock = match (honor_dst, meter.time_zone.as_deref()) {
            (true, Some(name)) => WallClock::Zone(
                name.parse()
                    .map_err(|e| ReadingsError::parse(0, "time_zone", name, format!("{e}")))?,
            ),
            (true, None) => {
                tracing::warn!(meter_id = meter.id, "DST requested but meter has no time zone, using UTC");
                WallClock::Utc
            }
            (false, _) => WallClock::Utc,
        };

        Ok(Self {
            meter_id: meter.id,
            time_sort: meter.time_sort,
            reading_repetition: usize::try_from(meter.reading_duplication).unwrap_or(1).max(1),
            cumulative: meter.cumulative,
            cumulative_reset: meter.cumulative_reset.then_some(ResetWindow {
                start: meter.cumulative_reset_start,
                end: meter.cumulative_reset_end,
            }),
            end_only: meter.end_only_time,
            reading_frequency: meter.reading_frequency(),
            max_gap_secs: meter.reading_gap_secs,
            max_variation_secs: meter.reading_variation_secs,
            wall_clock,
            relaxed_parsing,
            conditions: None,
        })
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// End-only rows without a known frequency: the first end only starts the next reading.
    fn anchors_on_first_end(&self) -> bool {
        self.end_only && self.reading_frequency <= Duration::ZERO
    }

    fn limits(&self) -> SequenceLimits {
        SequenceLimits {
            max_gap_secs: self.max_gap_secs,
            frequency_secs: self.reading_frequency.as_seconds_f64(),
            max_variation_secs: self.max_variation_secs,
        }
    }
}

/// Normalize `rows` into time-ordered canonical readings.
pub fn normalize(rows: &[RawRow], options: &NormalizeOptions) -> Result<Vec<Reading>> {
    let mut parsed = rows
        .iter()
        .map(|raw| parse_row(raw, options))
        .collect::<Result<Vec<_>>>()?;

    sort_rows(&mut parsed, options.time_sort);
    let parsed = repetition::collapse(parsed, options.reading_repetition)?;
    let mut timed = place_on_timeline(&parsed, options)?;

    if options.cumulative {
        timed = difference_counters(timed, options)?;
    } else if options.anchors_on_first_end() && !timed.is_empty() {
        let anchor = timed.remove(0);
        tracing::debug!(meter_id = options.meter_id, row = anchor.row, "first end-only row only anchors the timeline");
    }

    validate::check_sequence(&timed, options.limits())?;
    if let Some(conditions) = &options.conditions {
        conditions.check(&timed)?;
    }

    Ok(timed
        .into_iter()
        .map(|row| Reading {
            meter_id: options.meter_id,
            start_timestamp: row.start,
            end_timestamp: row.end,
            value: row.value,
        })
        .collect())
}

fn parse_row(raw: &RawRow, options: &NormalizeOptions) -> Result<ParsedRow> {
    let relaxed = options.relaxed_parsing;
    let value = parse_value(raw.row, &raw.value, relaxed)?;
    let end = parse_stamp(raw.row, "end", &raw.end, relaxed)?;
    let start = match (options.end_only, raw.start.as_deref()) {
        (true, _) => None,
        (false, Some(text)) => Some(parse_stamp(raw.row, "start", text, relaxed)?),
        (false, None) => return Err(ReadingsError::parse(raw.row, "start", "", "missing start timestamp")),
    };
    Ok(ParsedRow {
        row: raw.row,
        value,
        start,
        end,
    })
}

fn sort_rows(rows: &mut [ParsedRow], order: TimeSort) {
    match order {
        TimeSort::Increasing => {}
        TimeSort::Decreasing => rows.reverse(),
        TimeSort::Unknown => rows.sort_by_key(|r| r.end.provisional()),
    }
}

fn place_on_timeline(rows: &[ParsedRow], options: &NormalizeOptions) -> Result<Vec<TimedRow>> {
    let clock = options.wall_clock;
    let mut previous_end: Option<OffsetDateTime> = None;
    let mut timed = Vec::with_capacity(rows.len());

    for row in rows {
        let start = row
            .start
            .map(|stamp| {
                let floor = previous_end.map_or(Floor::None, Floor::AtOrAfter);
                resolve(clock, row.row, "start", stamp, floor)
            })
            .transpose()?;

        let end_floor = match (start, previous_end) {
            (Some(start), _) => Floor::After(start),
            (None, Some(previous)) => Floor::After(previous),
            (None, None) => Floor::None,
        };
        let end = resolve(clock, row.row, "end", row.end, end_floor)?;
        let start = start.unwrap_or_else(|| previous_end.unwrap_or(end - options.reading_frequency));

        timed.push(TimedRow {
            row: row.row,
            value: row.value,
            start,
            end,
        });
        previous_end = Some(end);
    }
    Ok(timed)
}

fn resolve(clock: WallClock, row: usize, field: &'static str, stamp: Stamp, floor: Floor) -> Result<OffsetDateTime> {
    match stamp {
        Stamp::Instant(ts) => Ok(ts),
        Stamp::Wall(wall) => clock.resolve(wall, floor).ok_or_else(|| {
            ReadingsError::parse(row, field, &wall.to_string(), "wall-clock time does not exist in the meter time zone")
        }),
    }
}

fn difference_counters(rows: Vec<TimedRow>, options: &NormalizeOptions) -> Result<Vec<TimedRow>> {
    let mut rows = rows.into_iter();
    let Some(seed) = rows.next() else {
        return Ok(Vec::new());
    };

    let mut counter = seed.value;
    rows.map(|row| {
        let start_of_day = options.wall_clock.time_of_day(row.start);
        let value = interval_value(counter, row.value, start_of_day, options.cumulative_reset).ok_or(
            ReadingsError::CumulativeReset {
                row: row.row,
                previous: counter,
                current: row.value,
            },
        )?;
        counter = row.value;
        Ok(TimedRow { value, ..row })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, time};

    fn options() -> NormalizeOptions {
        NormalizeOptions {
            meter_id: 7,
            time_sort: TimeSort::Increasing,
            reading_repetition: 1,
            cumulative: false,
            cumulative_reset: None,
            end_only: false,
            reading_frequency: Duration::HOUR,
            max_gap_secs: 0.0,
            max_variation_secs: 0.0,
            wall_clock: WallClock::Utc,
            relaxed_parsing: false,
            conditions: None,
        }
    }

    fn raw(row: usize, value: &str, start: Option<&str>, end: &str) -> RawRow {
        RawRow {
            row,
            value: value.to_string(),
            start: start.map(str::to_string),
            end: end.to_string(),
        }
    }

    fn hourly(values: &[&str]) -> Vec<RawRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let start = format!("2022-01-01 {i:02}:00:00");
                let end = format!("2022-01-01 {:02}:00:00", i + 1);
                raw(i + 1, v, Some(&start), &end)
            })
            .collect()
    }

    #[test]
    fn increasing_rows_become_readings() {
        let readings = normalize(&hourly(&["1", "2", "3"]), &options()).unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].meter_id, 7);
        assert_eq!(readings[0].start_timestamp, datetime!(2022-01-01 00:00 UTC));
        assert_eq!(readings[2].end_timestamp, datetime!(2022-01-01 03:00 UTC));
        assert_eq!(readings.iter().map(|r| r.value).sum::<f64>(), 6.0);
    }

    #[test]
    fn decreasing_and_unknown_orders_are_sorted() {
        let mut rows = hourly(&["1", "2", "3"]);
        rows.reverse();
        let decreasing = NormalizeOptions {
            time_sort: TimeSort::Decreasing,
            ..options()
        };
        let readings = normalize(&rows, &decreasing).unwrap();
        assert_eq!(readings.iter().map(|r| r.value).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);

        rows.swap(0, 1);
        let unknown = NormalizeOptions {
            time_sort: TimeSort::Unknown,
            ..options()
        };
        let readings = normalize(&rows, &unknown).unwrap();
        assert_eq!(readings.iter().map(|r| r.value).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);

        // Declared increasing but actually reversed: overlap surfaces.
        assert!(normalize(&rows, &options()).is_err());
    }

    #[test]
    fn parse_failures_name_row_and_field() {
        let mut rows = hourly(&["1", "x", "3"]);
        let err = normalize(&rows, &options()).unwrap_err();
        assert!(matches!(err, ReadingsError::Parse { row: 2, field: "reading", .. }));

        rows[1].value = "2".into();
        rows[2].end = "not a time".into();
        let err = normalize(&rows, &options()).unwrap_err();
        assert!(matches!(err, ReadingsError::Parse { row: 3, field: "end", .. }));

        rows[2].end = "2022-01-01 03:00:00".into();
        rows[2].start = None;
        let err = normalize(&rows, &options()).unwrap_err();
        assert!(matches!(err, ReadingsError::Parse { row: 3, field: "start", .. }));
    }

    #[test]
    fn end_only_rows_chain_from_previous_end() {
        let rows = vec![
            raw(1, "5", None, "2022-01-01 01:00:00"),
            raw(2, "6", None, "2022-01-01 02:00:00"),
        ];
        let end_only = NormalizeOptions {
            end_only: true,
            ..options()
        };
        let readings = normalize(&rows, &end_only).unwrap();
        assert_eq!(readings[0].start_timestamp, datetime!(2022-01-01 00:00 UTC));
        assert_eq!(readings[1].start_timestamp, datetime!(2022-01-01 01:00 UTC));
    }

    #[test]
    fn end_only_without_frequency_starts_at_first_end() {
        let rows = vec![
            raw(1, "5", None, "2022-01-01 01:00:00"),
            raw(2, "6", None, "2022-01-01 02:00:00"),
            raw(3, "7", None, "2022-01-01 03:00:00"),
        ];
        let unknown_frequency = NormalizeOptions {
            end_only: true,
            reading_frequency: Duration::ZERO,
            ..options()
        };
        let readings = normalize(&rows, &unknown_frequency).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].start_timestamp, datetime!(2022-01-01 01:00 UTC));
        assert_eq!(readings.iter().map(|r| r.value).collect::<Vec<_>>(), vec![6.0, 7.0]);

        let cumulative = NormalizeOptions {
            cumulative: true,
            ..unknown_frequency
        };
        let rows = vec![
            raw(1, "10", None, "2022-01-01 01:00:00"),
            raw(2, "15", None, "2022-01-01 02:00:00"),
            raw(3, "21", None, "2022-01-01 03:00:00"),
        ];
        let readings = normalize(&rows, &cumulative).unwrap();
        assert_eq!(readings.iter().map(|r| r.value).collect::<Vec<_>>(), vec![5.0, 6.0]);
        assert_eq!(readings[0].start_timestamp, datetime!(2022-01-01 01:00 UTC));
    }

    #[test]
    fn repeated_rows_collapse() {
        let rows: Vec<_> = hourly(&["1", "2"])
            .into_iter()
            .flat_map(|r| [r.clone(), RawRow { row: r.row + 100, ..r }])
            .collect();
        let repeated = NormalizeOptions {
            reading_repetition: 2,
            ..options()
        };
        let readings = normalize(&rows, &repeated).unwrap();
        assert_eq!(readings.len(), 2);
        assert!(normalize(&rows, &options()).is_err());
    }

    #[test]
    fn cumulative_counters_become_deltas() {
        let cumulative = NormalizeOptions {
            cumulative: true,
            ..options()
        };
        let readings = normalize(&hourly(&["100", "104", "110"]), &cumulative).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].start_timestamp, datetime!(2022-01-01 01:00 UTC));
        assert_eq!(readings.iter().map(|r| r.value).collect::<Vec<_>>(), vec![4.0, 6.0]);
    }

    #[test]
    fn cumulative_reset_respects_window_edges() {
        // The reset reading starts at 02:00.
        let rows = hourly(&["100", "104", "3"]);
        let at_edge = NormalizeOptions {
            cumulative: true,
            cumulative_reset: Some(ResetWindow {
                start: time!(01:00),
                end: time!(02:00),
            }),
            ..options()
        };
        let readings = normalize(&rows, &at_edge).unwrap();
        assert_eq!(readings[1].value, 3.0);

        let just_outside = NormalizeOptions {
            cumulative_reset: Some(ResetWindow {
                start: time!(01:00),
                end: time!(01:59:59),
            }),
            ..at_edge.clone()
        };
        assert!(matches!(
            normalize(&rows, &just_outside),
            Err(ReadingsError::CumulativeReset { row: 3, .. })
        ));

        let no_reset = NormalizeOptions {
            cumulative_reset: None,
            ..at_edge
        };
        assert!(normalize(&rows, &no_reset).is_err());
    }

    #[test]
    fn fall_back_half_hours_keep_their_length() {
        let walls = ["00:00", "00:30", "01:00", "01:30", "01:00", "01:30", "02:00"];
        let rows: Vec<_> = walls
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                raw(
                    i + 1,
                    "1",
                    Some(&format!("2022-11-06 {}:00", pair[0])),
                    &format!("2022-11-06 {}:00", pair[1]),
                )
            })
            .collect();
        let chicago = NormalizeOptions {
            wall_clock: WallClock::Zone(chrono_tz::America::Chicago),
            reading_frequency: Duration::minutes(30),
            ..options()
        };
        let readings = normalize(&rows, &chicago).unwrap();
        assert_eq!(readings.len(), 6);
        assert!(readings.iter().all(|r| r.duration() == Duration::minutes(30)));
        assert_eq!(readings[0].start_timestamp, datetime!(2022-11-06 05:00 UTC));
        assert_eq!(readings[5].end_timestamp, datetime!(2022-11-06 08:00 UTC));
    }

    #[test]
    fn spring_forward_boundary_reading_is_one_hour() {
        let rows = vec![
            raw(1, "1", Some("2022-03-13 00:00:00"), "2022-03-13 01:00:00"),
            raw(2, "1", Some("2022-03-13 01:00:00"), "2022-03-13 03:00:00"),
            raw(3, "1", Some("2022-03-13 03:00:00"), "2022-03-13 04:00:00"),
        ];
        let chicago = NormalizeOptions {
            wall_clock: WallClock::Zone(chrono_tz::America::Chicago),
            ..options()
        };
        let readings = normalize(&rows, &chicago).unwrap();
        assert!(readings.iter().all(|r| r.duration() == Duration::HOUR));

        let missing = vec![raw(1, "1", Some("2022-03-13 01:30:00"), "2022-03-13 02:30:00")];
        assert!(matches!(
            normalize(&missing, &chicago),
            Err(ReadingsError::Parse { row: 1, field: "end", .. })
        ));
    }

    #[test]
    fn conditions_reject_out_of_range_values() {
        let bounded = options().with_conditions(ConditionSet {
            max_val: Some(2.0),
            ..ConditionSet::default()
        });
        assert!(matches!(
            normalize(&hourly(&["1", "2", "3"]), &bounded),
            Err(ReadingsError::Condition { .. })
        ));
    }

    #[test]
    fn options_follow_meter_defaults() {
        let meter = Meter {
            id: 3,
            name: "boiler".into(),
            unit_id: 1,
            default_graphic_unit: None,
            reading_frequency_secs: 900,
            cumulative: true,
            cumulative_reset: true,
            cumulative_reset_start: time!(23:00),
            cumulative_reset_end: time!(01:00),
            reading_gap_secs: 60.0,
            reading_variation_secs: 5.0,
            reading_duplication: 3,
            time_sort: TimeSort::Unknown,
            end_only_time: true,
            time_zone: Some("America/Chicago".into()),
        };
        let opts = NormalizeOptions::from_meter(&meter, true, true).unwrap();
        assert_eq!(opts.reading_frequency, Duration::minutes(15));
        assert_eq!(opts.reading_repetition, 3);
        assert_eq!(opts.wall_clock, WallClock::Zone(chrono_tz::America::Chicago));
        assert!(opts.cumulative_reset.is_some_and(|w| w.contains(time!(00:30))));

        let utc = NormalizeOptions::from_meter(&meter, false, false).unwrap();
        assert_eq!(utc.wall_clock, WallClock::Utc);

        let bad_zone = Meter {
            time_zone: Some("Mars/Olympus".into()),
            ..meter
        };
        assert!(NormalizeOptions::from_meter(&bad_zone, true, false).is_err());
    }
}
