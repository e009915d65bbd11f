use std::sync::Arc;

use readings_client::{
    domain::{
        check_unit_deletable, EditSignals, GroupId, Meter, MeterId, Reading, TimeInterval, Unit, UnitId,
    },
    ReadingStore,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    aggregate::{
        bar_points, group_line_points, line_points, range_points, LineResolution, MeterSeries, RangePoint,
        SeriesPoint, DEFAULT_MAX_RAW_POINTS,
    },
    compare::{alignment_notes, period_total, CompareLines, ComparePeriods, CompareTotals, Shift},
    error::{ReadingsError, Result},
    units::{UnitGraph, UnitGraphCache, UnitOptions},
};

/// What a series is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Target {
    Meter(MeterId),
    Group(GroupId),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Meter(id) => write!(f, "meter {id}"),
            Self::Group(id) => write!(f, "group {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LineConfig {
    #[serde(default = "default_max_raw_points")]
    pub max_raw_points: usize,
}

fn default_max_raw_points() -> usize {
    DEFAULT_MAX_RAW_POINTS
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_raw_points: DEFAULT_MAX_RAW_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub resolution: LineResolution,
    pub points: Vec<SeriesPoint>,
}

/// Readings of every member meter plus the conversion parameters for one display unit.
struct Loaded {
    meters: Vec<Meter>,
    readings: Vec<Vec<Reading>>,
    graph: Arc<UnitGraph>,
    display_sec_in_rate: f64,
}

impl Loaded {
    fn series(&self, display_unit: UnitId) -> Result<Vec<MeterSeries<'_>>> {
        self.meters
            .iter()
            .zip(&self.readings)
            .map(|(meter, readings)| {
                Ok(MeterSeries {
                    readings,
                    represent: self.graph.unit(meter.unit_id)?.unit_represent,
                    transform: self.graph.resolve(meter.unit_id, display_unit)?,
                    display_sec_in_rate: self.display_sec_in_rate,
                })
            })
            .collect()
    }
}

/// Entry point for every read over canonical readings.
///
/// The unit cache is shared with whatever edits units and conversions, which
/// must call [`UnitGraphCache::invalidate`] once an edit commits.
pub struct ReadingsQuery<S: ?Sized> {
    store: Arc<S>,
    units: Arc<UnitGraphCache>,
    line: LineConfig,
}

impl<S> ReadingsQuery<S>
where
    S: ReadingStore + ?Sized,
{
    pub fn new(store: Arc<S>, units: Arc<UnitGraphCache>, line: LineConfig) -> Self {
        Self { store, units, line }
    }

    pub fn unit_cache(&self) -> &Arc<UnitGraphCache> {
        &self.units
    }

    pub async fn bar_series(
        &self,
        target: Target,
        interval: TimeInterval,
        bar_width_days: u32,
        display_unit: UnitId,
    ) -> Result<Vec<SeriesPoint>> {
        count_request("bar", target);
        let loaded = self.load(target, interval, display_unit).await?;
        let series = loaded.series(display_unit)?;
        let points: Vec<_> = bar_points(&series, &interval, bar_width_days)?.collect();
        tracing::debug!(%target, %interval, bar_width_days, points = points.len(), "bar series");
        Ok(points)
    }

    pub async fn line_series(&self, target: Target, interval: TimeInterval, display_unit: UnitId) -> Result<LineSeries> {
        count_request("line", target);
        let loaded = self.load(target, interval, display_unit).await?;
        let series = loaded.series(display_unit)?;
        let (resolution, points) = match (target, series.as_slice()) {
            (Target::Meter(_), [single]) => line_points(*single, self.line.max_raw_points),
            _ => group_line_points(&series, &interval, self.line.max_raw_points),
        };
        let points: Vec<_> = points.collect();
        tracing::debug!(%target, %interval, ?resolution, points = points.len(), "line series");
        Ok(LineSeries { resolution, points })
    }

    pub async fn range_series(
        &self,
        target: Target,
        interval: TimeInterval,
        width_days: u32,
        display_unit: UnitId,
    ) -> Result<Vec<RangePoint>> {
        count_request("range", target);
        if let Target::Group(_) = target {
            return Err(ReadingsError::UnsupportedMode {
                mode: "range",
                subject: target.to_string(),
            });
        }
        let loaded = self.load(target, interval, display_unit).await?;
        let series = loaded.series(display_unit)?;
        let Some(single) = series.first() else {
            return Ok(Vec::new());
        };
        let points: Vec<_> = range_points(*single, &interval, width_days)?.collect();
        Ok(points)
    }

    /// `[shifted_total, current_total]` of a period and the same period `shift` earlier.
    pub async fn compare_totals(
        &self,
        target: Target,
        current_start: OffsetDateTime,
        current_end: OffsetDateTime,
        shift: Shift,
        display_unit: UnitId,
    ) -> Result<CompareTotals> {
        count_request("compare", target);
        let periods = ComparePeriods::new(current_start, current_end, shift)?;

        let current = self.load(target, bounded(periods.current)?, display_unit).await?;
        let shifted = self.load(target, bounded(periods.shifted)?, display_unit).await?;
        let totals = CompareTotals {
            shifted_total: period_total(&shifted.series(display_unit)?, periods.shifted)?,
            current_total: period_total(&current.series(display_unit)?, periods.current)?,
        };
        tracing::debug!(%target, ?periods, ?totals, "compare totals");
        Ok(totals)
    }

    /// Line series of a period and the same period `shift` earlier, with alignment notes.
    pub async fn compare_lines(
        &self,
        target: Target,
        current_start: OffsetDateTime,
        current_end: OffsetDateTime,
        shift: Shift,
        display_unit: UnitId,
    ) -> Result<CompareLines> {
        let periods = ComparePeriods::new(current_start, current_end, shift)?;
        let current = self.line_series(target, bounded(periods.current)?, display_unit).await?;
        let shifted = self.line_series(target, bounded(periods.shifted)?, display_unit).await?;

        let starts = |line: &LineSeries| line.points.iter().map(|p| p.start_timestamp).collect::<Vec<_>>();
        let notes = alignment_notes(&starts(&current), &starts(&shifted));
        if !notes.is_empty() {
            tracing::debug!(%target, ?notes, "compare line alignment");
        }
        Ok(CompareLines { shifted, current, notes })
    }

    /// Display units every one of `meters` can be graphed in.
    pub async fn unit_options(&self, meters: &[MeterId], is_admin: bool) -> Result<UnitOptions> {
        let graph = self.units.graph(self.store.as_ref()).await?;
        let mut sources = Vec::with_capacity(meters.len());
        for &meter_id in meters {
            sources.push(self.meter(meter_id).await?.unit_id);
        }
        graph.unit_options(&sources, is_admin)
    }

    /// Validate an edited unit and drop the cached graph when the edit affects it.
    ///
    /// Call after the edit has been committed to the store.
    pub async fn unit_edited(&self, before: &Unit, after: &Unit) -> Result<EditSignals> {
        after.validate()?;
        let signals = before.edit_signals(after);
        if signals.any() {
            self.units.invalidate().await;
        }
        tracing::info!(unit_id = after.id, ?signals, "unit edited");
        Ok(signals)
    }

    /// Fails with the list of referrers when `unit_id` is still in use.
    pub async fn check_unit_deletion(&self, unit_id: UnitId) -> Result<()> {
        let units = self.store.fetch_units().await?;
        let unit = units
            .iter()
            .find(|u| u.id == unit_id)
            .ok_or(ReadingsError::UnknownUnit(unit_id))?;
        let meters = self.store.fetch_meters().await?;
        let conversions = self.store.fetch_conversions().await?;
        check_unit_deletable(unit, &meters, &conversions, &units)?;
        Ok(())
    }

    async fn load(&self, target: Target, interval: TimeInterval, display_unit: UnitId) -> Result<Loaded> {
        let graph = self.units.graph(self.store.as_ref()).await?;
        let display_sec_in_rate = f64::from(graph.unit(display_unit)?.sec_in_rate);

        let meters = match target {
            Target::Meter(meter_id) => vec![self.meter(meter_id).await?],
            Target::Group(group_id) => {
                let members = self
                    .store
                    .fetch_group_meters(group_id)
                    .await?
                    .ok_or(ReadingsError::UnknownGroup(group_id))?;
                let mut meters = Vec::with_capacity(members.len());
                for meter_id in members {
                    meters.push(self.meter(meter_id).await?);
                }
                meters
            }
        };

        let mut readings = Vec::with_capacity(meters.len());
        for meter in &meters {
            readings.push(self.store.fetch_canonical_readings(meter.id, interval).await?);
        }

        Ok(Loaded {
            meters,
            readings,
            graph,
            display_sec_in_rate,
        })
    }

    async fn meter(&self, meter_id: MeterId) -> Result<Meter> {
        self.store
            .fetch_meter(meter_id)
            .await?
            .ok_or(ReadingsError::UnknownMeter(meter_id))
    }
}

fn bounded((start, end): (OffsetDateTime, OffsetDateTime)) -> Result<TimeInterval> {
    Ok(TimeInterval::bounded(start, end)?)
}

fn count_request(mode: &'static str, target: Target) {
    let kind = match target {
        Target::Meter(_) => "meter",
        Target::Group(_) => "group",
    };
    metrics::counter!("aggregation_requests_total", "mode" => mode, "target" => kind).increment(1);
}
