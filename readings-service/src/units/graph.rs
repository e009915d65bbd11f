use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use readings_client::domain::{Conversion, Unit, UnitId, UnitRepresent, UnitType};
use serde::Serialize;

use super::LinearTransform;
use crate::error::{ReadingsError, Result};

/// Seconds in the per-hour basis every flow rate is normalized to before conversion.
pub const CANONICAL_SEC_IN_RATE: f64 = 3600.0;

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: usize,
    transform: LinearTransform,
}

/// Immutable snapshot of the unit conversion graph.
///
/// Units live in an arena indexed by position; each node keeps its outgoing
/// edges in conversion insertion order so breadth-first search is reproducible.
#[derive(Debug)]
pub struct UnitGraph {
    units: Vec<Unit>,
    index: HashMap<UnitId, usize>,
    edges: Vec<Vec<Edge>>,
    generation: u64,
    memo: Mutex<HashMap<(UnitId, UnitId), Option<LinearTransform>>>,
}

/// Display units a set of meters can be graphed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitOptions {
    pub compatible: Vec<UnitId>,
    pub incompatible: Vec<UnitId>,
}

impl UnitGraph {
    pub fn build(units: Vec<Unit>, conversions: &[Conversion], generation: u64) -> Result<Self> {
        let index: HashMap<UnitId, usize> = units.iter().enumerate().map(|(i, u)| (u.id, i)).collect();
        let mut edges = vec![Vec::new(); units.len()];

        for conversion in conversions {
            conversion.validate()?;
            let source = *index
                .get(&conversion.source_id)
                .ok_or(ReadingsError::UnknownUnit(conversion.source_id))?;
            let destination = *index
                .get(&conversion.destination_id)
                .ok_or(ReadingsError::UnknownUnit(conversion.destination_id))?;

            let forward = LinearTransform::new(conversion.slope, conversion.intercept);
            edges[source].push(Edge {
                to: destination,
                transform: forward,
            });
            if conversion.bidirectional {
                edges[destination].push(Edge {
                    to: source,
                    transform: forward.inverse(),
                });
            }
        }

        Ok(Self {
            units,
            index,
            edges,
            generation,
            memo: Mutex::new(HashMap::new()),
        })
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.index
            .get(&id)
            .map(|&i| &self.units[i])
            .ok_or(ReadingsError::UnknownUnit(id))
    }

    /// Transform from values of `source_id` to values of `destination_id`,
    /// flow rates included.
    pub fn resolve(&self, source_id: UnitId, destination_id: UnitId) -> Result<LinearTransform> {
        let source = self.unit(source_id)?;
        let destination = self.unit(destination_id)?;

        let key = (source_id, destination_id);
        if let Some(cached) = self.memo_get(key) {
            return cached.ok_or(ReadingsError::NoConversionPath {
                source_id,
                destination_id,
            });
        }

        let resolved = if source_id == destination_id {
            Some(LinearTransform::IDENTITY)
        } else {
            metrics::counter!("unit_graph_path_searches_total").increment(1);
            self.path_transform(self.index[&source_id], self.index[&destination_id])
                .map(|path| rate_in(source).then(path).then(rate_out(destination)))
        };
        self.memo_put(key, resolved);

        resolved.ok_or(ReadingsError::NoConversionPath {
            source_id,
            destination_id,
        })
    }

    /// Display units reachable from every one of `sources`.
    ///
    /// Only real units that the viewer may see are candidates; candidates that
    /// some source cannot reach are reported separately.
    pub fn unit_options(&self, sources: &[UnitId], is_admin: bool) -> Result<UnitOptions> {
        for &source in sources {
            self.unit(source)?;
        }

        let mut options = UnitOptions::default();
        for unit in self.units.iter().filter(|u| {
            matches!(u.type_of_unit, UnitType::Unit | UnitType::Suffix) && u.displayable.visible_to(is_admin)
        }) {
            if sources.iter().all(|&source| self.resolve(source, unit.id).is_ok()) {
                options.compatible.push(unit.id);
            } else {
                options.incompatible.push(unit.id);
            }
        }
        Ok(options)
    }

    /// Breadth-first search; the first path found wins.
    fn path_transform(&self, from: usize, to: usize) -> Option<LinearTransform> {
        let mut via: Vec<Option<(usize, LinearTransform)>> = vec![None; self.units.len()];
        let mut seen = vec![false; self.units.len()];
        let mut queue = VecDeque::from([from]);
        seen[from] = true;

        while let Some(node) = queue.pop_front() {
            if node == to {
                break;
            }
            for edge in &self.edges[node] {
                if !seen[edge.to] {
                    seen[edge.to] = true;
                    via[edge.to] = Some((node, edge.transform));
                    queue.push_back(edge.to);
                }
            }
        }

        if !seen[to] {
            return None;
        }

        let mut hops = Vec::new();
        let mut node = to;
        while let Some((previous, transform)) = via[node] {
            hops.push(transform);
            node = previous;
        }
        Some(
            hops.into_iter()
                .rev()
                .fold(LinearTransform::IDENTITY, LinearTransform::then),
        )
    }

    fn memo_get(&self, key: (UnitId, UnitId)) -> Option<Option<LinearTransform>> {
        self.memo.lock().ok().and_then(|memo| memo.get(&key).copied())
    }

    fn memo_put(&self, key: (UnitId, UnitId), value: Option<LinearTransform>) {
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key, value);
        }
    }
}

/// Normalize a flow rate to the per-hour basis.
fn rate_in(unit: &Unit) -> LinearTransform {
    match unit.unit_represent {
        UnitRepresent::Flow => LinearTransform::scale(CANONICAL_SEC_IN_RATE / f64::from(unit.sec_in_rate)),
        UnitRepresent::Quantity | UnitRepresent::Raw => LinearTransform::IDENTITY,
    }
}

/// Rescale a per-hour flow rate to the unit's own basis.
fn rate_out(unit: &Unit) -> LinearTransform {
    match unit.unit_represent {
        UnitRepresent::Flow => LinearTransform::scale(f64::from(unit.sec_in_rate) / CANONICAL_SEC_IN_RATE),
        UnitRepresent::Quantity | UnitRepresent::Raw => LinearTransform::IDENTITY,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use readings_client::domain::Displayable;

    pub(crate) fn unit(id: UnitId, name: &str, represent: UnitRepresent, kind: UnitType, displayable: Displayable) -> Unit {
        Unit {
            id,
            name: name.to_string(),
            identifier: String::new(),
            unit_represent: represent,
            sec_in_rate: 3600,
            type_of_unit: kind,
            suffix: String::new(),
            displayable,
            preferred_display: false,
            note: None,
        }
    }

    pub(crate) fn conversion(source_id: UnitId, destination_id: UnitId, bidirectional: bool, slope: f64, intercept: f64) -> Conversion {
        Conversion {
            source_id,
            destination_id,
            bidirectional,
            slope,
            intercept,
            note: None,
        }
    }

    /// Electric_Utility -> kWh -> kg CO2 -> kg <-> Metric ton, kWh <-> MJ, plus an isolated unit.
    fn co2_graph() -> UnitGraph {
        use Displayable::{All, None as Hidden};
        use UnitRepresent::Quantity;
        let units = vec![
            unit(1, "Electric_Utility", Quantity, UnitType::Meter, Hidden),
            unit(2, "kWh", Quantity, UnitType::Unit, All),
            unit(3, "kg CO₂", Quantity, UnitType::Unit, All),
            unit(4, "kg", Quantity, UnitType::Unit, All),
            unit(5, "Metric ton", Quantity, UnitType::Unit, All),
            unit(6, "MJ", Quantity, UnitType::Unit, All),
            unit(7, "gallon", Quantity, UnitType::Unit, All),
        ];
        let conversions = vec![
            conversion(1, 2, false, 1.0, 0.0),
            conversion(2, 3, false, 0.709, 0.0),
            conversion(3, 4, false, 1.0, 0.0),
            conversion(4, 5, true, 1e-3, 0.0),
            conversion(2, 6, true, 3.6, 0.0),
        ];
        UnitGraph::build(units, &conversions, 0).unwrap()
    }

    #[test]
    fn chained_conversion_to_metric_ton() {
        let graph = co2_graph();
        let transform = graph.resolve(1, 5).unwrap();
        assert_relative_eq!(transform.apply(3120.01835362067), 2.21209301271706, max_relative = 1e-9);
        assert_relative_eq!(transform.apply(3367.50141893133), 2.38755850602232, max_relative = 1e-9);
    }

    #[test]
    fn reverse_edge_inverts_slope() {
        let graph = co2_graph();
        let mj_to_kwh = graph.resolve(6, 2).unwrap();
        assert_relative_eq!(mj_to_kwh.apply(3.6), 1.0, max_relative = 1e-12);
    }

    #[test]
    fn bidirectional_round_trip_is_identity() {
        let graph = co2_graph();
        for (a, b) in [(2, 6), (4, 5)] {
            let there = graph.resolve(a, b).unwrap();
            let back = graph.resolve(b, a).unwrap();
            assert!(there.then(back).approx_eq(LinearTransform::IDENTITY, 1e-9));
        }
    }

    #[test]
    fn one_way_edges_do_not_reverse() {
        let graph = co2_graph();
        assert!(matches!(
            graph.resolve(3, 2),
            Err(ReadingsError::NoConversionPath { source_id: 3, destination_id: 2 })
        ));
    }

    #[test]
    fn unreachable_unit_is_incompatible_option() {
        let graph = co2_graph();
        let options = graph.unit_options(&[1], false).unwrap();
        assert_eq!(options.compatible, vec![2, 3, 4, 5, 6]);
        assert_eq!(options.incompatible, vec![7]);
        assert!(matches!(graph.resolve(1, 7), Err(ReadingsError::NoConversionPath { .. })));
    }

    #[test]
    fn admin_only_units_need_admin() {
        use UnitRepresent::Quantity;
        let units = vec![
            unit(1, "meter", Quantity, UnitType::Meter, Displayable::None),
            unit(2, "kWh", Quantity, UnitType::Unit, Displayable::Admin),
        ];
        let graph = UnitGraph::build(units, &[conversion(1, 2, false, 1.0, 0.0)], 0).unwrap();
        assert!(graph.unit_options(&[1], false).unwrap().compatible.is_empty());
        assert_eq!(graph.unit_options(&[1], true).unwrap().compatible, vec![2]);
    }

    #[test]
    fn breadth_first_prefers_shortest_then_first_inserted() {
        use UnitRepresent::Quantity;
        let units = (1..=4)
            .map(|id| unit(id, &format!("u{id}"), Quantity, UnitType::Unit, Displayable::All))
            .collect();
        // 1 -> 2 -> 4 and 1 -> 3 -> 4 are equally short; 1 -> 2 was inserted first.
        let conversions = vec![
            conversion(1, 2, false, 2.0, 0.0),
            conversion(1, 3, false, 3.0, 0.0),
            conversion(3, 4, false, 1.0, 0.0),
            conversion(2, 4, false, 1.0, 0.0),
        ];
        let graph = UnitGraph::build(units, &conversions, 0).unwrap();
        assert_eq!(graph.resolve(1, 4).unwrap(), LinearTransform::scale(2.0));
    }

    #[test]
    fn flow_rates_are_rescaled_by_seconds_in_rate() {
        let thing_36 = Unit {
            sec_in_rate: 36,
            ..unit(1, "Thing_36", UnitRepresent::Flow, UnitType::Meter, Displayable::None)
        };
        let thing_unit = unit(2, "thing unit", UnitRepresent::Flow, UnitType::Unit, Displayable::All);
        let graph = UnitGraph::build(vec![thing_36, thing_unit], &[conversion(1, 2, false, 1.0, 0.0)], 0).unwrap();
        // One thing per 36 seconds is 100 things per hour.
        assert_relative_eq!(graph.resolve(1, 2).unwrap().apply(1.0), 100.0, max_relative = 1e-12);
    }

    #[test]
    fn build_rejects_bad_conversions() {
        use UnitRepresent::Quantity;
        let units = vec![
            unit(1, "a", Quantity, UnitType::Unit, Displayable::All),
            unit(2, "b", Quantity, UnitType::Unit, Displayable::All),
        ];
        assert!(matches!(
            UnitGraph::build(units.clone(), &[conversion(1, 2, true, 0.0, 1.0)], 0),
            Err(ReadingsError::InvalidConversion(_))
        ));
        assert!(matches!(
            UnitGraph::build(units, &[conversion(1, 9, false, 1.0, 0.0)], 0),
            Err(ReadingsError::UnknownUnit(9))
        ));
    }
}
