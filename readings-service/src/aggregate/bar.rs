use readings_client::domain::{TimeInterval, UnitRepresent};
use time::OffsetDateTime;

use super::{bucket_width, reject_raw, resolve_span, Buckets, MeterSeries, SeriesPoint};
use crate::error::Result;

/// Bar series: one summed point per bucket of `width_days` days.
///
/// Each series contributes its own converted total; a group's bar is the sum
/// of its members.
pub fn bar_points<'a>(
    series: &'a [MeterSeries<'a>],
    interval: &TimeInterval,
    width_days: u32,
) -> Result<impl Iterator<Item = SeriesPoint> + 'a> {
    reject_raw(series, "bar")?;
    let width = bucket_width(width_days)?;
    let buckets = resolve_span(series, interval)
        .map(|(start, end)| Buckets::new(start, end, width))
        .into_iter()
        .flatten();

    Ok(buckets.filter_map(move |(start, end)| {
        let value = total(series, start, end)?;
        Some(SeriesPoint {
            start_timestamp: start,
            end_timestamp: end,
            value,
        })
    }))
}

/// Converted total of all series over `[start, end)`, `None` without data.
pub(crate) fn total(series: &[MeterSeries<'_>], start: OffsetDateTime, end: OffsetDateTime) -> Option<f64> {
    series
        .iter()
        .filter_map(|s| series_total(s, start, end))
        .reduce(|a, b| a + b)
}

fn series_total(series: &MeterSeries<'_>, start: OffsetDateTime, end: OffsetDateTime) -> Option<f64> {
    let hits = series.overlapping(start, end);
    if hits.is_empty() {
        return None;
    }

    let value = match series.represent {
        // Pro-rate each amount by its share inside the bucket, then convert once.
        UnitRepresent::Quantity => series.transform.apply(
            hits.iter()
                .map(|r| r.value * r.overlap_seconds(start, end) / r.duration_seconds())
                .sum(),
        ),
        // Convert each rate, then integrate over the time inside the bucket.
        UnitRepresent::Flow | UnitRepresent::Raw => hits
            .iter()
            .map(|r| series.transform.apply(r.value) * r.overlap_seconds(start, end) / series.display_sec_in_rate)
            .sum(),
    };
    Some(value)
}
