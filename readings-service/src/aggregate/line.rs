use readings_client::domain::TimeInterval;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::{floor_to, resolve_span, Buckets, MeterSeries, SeriesPoint};

/// Granularity a line series ended up at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineResolution {
    Raw,
    Hourly,
    Daily,
}

impl LineResolution {
    fn step(self) -> Option<Duration> {
        match self {
            Self::Raw => None,
            Self::Hourly => Some(Duration::HOUR),
            Self::Daily => Some(Duration::DAY),
        }
    }

    /// Hourly when that stays within `max_points` over the span, daily otherwise.
    fn coarse(start: OffsetDateTime, end: OffsetDateTime, max_points: usize) -> Self {
        let hours = (end - floor_to(start, Duration::HOUR)).whole_hours().max(0);
        if usize::try_from(hours).map_or(false, |h| h <= max_points) {
            Self::Hourly
        } else {
            Self::Daily
        }
    }
}

pub type LinePoints<'a> = Box<dyn Iterator<Item = SeriesPoint> + 'a>;

/// Line series of one meter: a point per reading, or time-weighted means of
/// hourly or daily buckets once there are more than `max_raw_points` readings.
pub fn line_points<'a>(series: MeterSeries<'a>, max_raw_points: usize) -> (LineResolution, LinePoints<'a>) {
    let (Some(first), Some(last)) = (series.readings.first(), series.readings.last()) else {
        return (LineResolution::Raw, Box::new(std::iter::empty()));
    };

    if series.readings.len() <= max_raw_points {
        let points = series.readings.iter().map(move |r| SeriesPoint {
            start_timestamp: r.start_timestamp,
            end_timestamp: r.end_timestamp,
            value: series.line_value(r),
        });
        return (LineResolution::Raw, Box::new(points));
    }

    let resolution = LineResolution::coarse(first.start_timestamp, last.end_timestamp, max_raw_points);
    let points = bucketed(vec![series], first.start_timestamp, last.end_timestamp, resolution);
    (resolution, points)
}

/// Line series of a group: each bucket is the sum of the members' mean rates.
///
/// Group lines are always bucketed, hourly unless that exceeds `max_points`.
pub fn group_line_points<'a>(
    series: &'a [MeterSeries<'a>],
    interval: &TimeInterval,
    max_points: usize,
) -> (LineResolution, LinePoints<'a>) {
    let data_span = resolve_span(series, &TimeInterval::unbounded());
    let Some((start, end)) = data_span.and_then(|(start, end)| {
        let start = interval.start().map_or(start, |s| s.max(start));
        let end = interval.end().map_or(end, |e| e.min(end));
        (start < end).then_some((start, end))
    }) else {
        return (LineResolution::Hourly, Box::new(std::iter::empty()));
    };

    let resolution = LineResolution::coarse(start, end, max_points);
    (resolution, bucketed(series.to_vec(), start, end, resolution))
}

fn bucketed<'a>(
    series: Vec<MeterSeries<'a>>,
    start: OffsetDateTime,
    end: OffsetDateTime,
    resolution: LineResolution,
) -> LinePoints<'a> {
    let step = resolution.step().unwrap_or(Duration::HOUR);
    let buckets = Buckets::new(floor_to(start, step), end, step);

    Box::new(buckets.filter_map(move |(start, end)| {
        let value = series
            .iter()
            .filter_map(|s| s.mean_line_value(start, end))
            .reduce(|a, b| a + b)?;
        Some(SeriesPoint {
            start_timestamp: start,
            end_timestamp: end,
            value,
        })
    }))
}
