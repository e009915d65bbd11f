use readings_client::domain::TimeInterval;

use super::{bucket_width, resolve_span, Buckets, MeterSeries, RangePoint};
use crate::error::Result;

/// Smallest and largest line value of the readings touching each bucket.
pub fn range_points<'a>(
    series: MeterSeries<'a>,
    interval: &TimeInterval,
    width_days: u32,
) -> Result<impl Iterator<Item = RangePoint> + 'a> {
    let width = bucket_width(width_days)?;
    let buckets = resolve_span(std::slice::from_ref(&series), interval)
        .map(|(start, end)| Buckets::new(start, end, width))
        .into_iter()
        .flatten();

    Ok(buckets.filter_map(move |(start, end)| {
        let (min, max) = series
            .overlapping(start, end)
            .iter()
            .map(|r| series.line_value(r))
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(RangePoint {
            start_timestamp: start,
            end_timestamp: end,
            min,
            max,
        })
    }))
}
