use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use tokio::sync::RwLock;

use crate::{
    domain::{merge_readings, Conversion, GroupId, Meter, MeterId, Reading, TimeInterval, Unit, UnitId},
    store::ReadingStore,
};

#[derive(Debug, Default)]
struct GroupMembers {
    meters: Vec<MeterId>,
    children: Vec<GroupId>,
}

#[derive(Debug, Default)]
struct State {
    units: Vec<Unit>,
    conversions: Vec<Conversion>,
    meters: Vec<Meter>,
    groups: BTreeMap<GroupId, GroupMembers>,
    readings: BTreeMap<MeterId, Vec<Reading>>,
}

/// In-process `ReadingStore` for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.state.get_mut().units.push(unit);
        self
    }

    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.state.get_mut().conversions.push(conversion);
        self
    }

    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.state.get_mut().meters.push(meter);
        self
    }

    pub fn with_group(mut self, group_id: GroupId, meters: Vec<MeterId>, children: Vec<GroupId>) -> Self {
        self.state
            .get_mut()
            .groups
            .insert(group_id, GroupMembers { meters, children });
        self
    }

    pub fn with_readings(mut self, meter_id: MeterId, mut readings: Vec<Reading>) -> Self {
        readings.sort_by_key(|r| r.start_timestamp);
        self.state.get_mut().readings.insert(meter_id, readings);
        self
    }

    pub async fn add_conversion(&self, conversion: Conversion) {
        self.state.write().await.conversions.push(conversion);
    }

    pub async fn remove_conversion(&self, source_id: UnitId, destination_id: UnitId) {
        self.state
            .write()
            .await
            .conversions
            .retain(|c| !(c.source_id == source_id && c.destination_id == destination_id));
    }

    pub async fn update_unit(&self, unit: Unit) {
        let mut state = self.state.write().await;
        match state.units.iter_mut().find(|u| u.id == unit.id) {
            Some(existing) => *existing = unit,
            None => state.units.push(unit),
        }
    }

    pub async fn stored_readings(&self, meter_id: MeterId) -> Vec<Reading> {
        self.state
            .read()
            .await
            .readings
            .get(&meter_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ReadingStore for MemoryStore {
    async fn fetch_canonical_readings(&self, meter_id: MeterId, interval: TimeInterval) -> Result<Vec<Reading>> {
        let state = self.state.read().await;
        Ok(state
            .readings
            .get(&meter_id)
            .map(|readings| {
                readings
                    .iter()
                    .filter(|r| interval.overlaps(r.start_timestamp, r.end_timestamp))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_units(&self) -> Result<Vec<Unit>> {
        Ok(self.state.read().await.units.clone())
    }

    async fn fetch_conversions(&self) -> Result<Vec<Conversion>> {
        Ok(self.state.read().await.conversions.clone())
    }

    async fn fetch_meters(&self) -> Result<Vec<Meter>> {
        Ok(self.state.read().await.meters.clone())
    }

    async fn fetch_meter(&self, meter_id: MeterId) -> Result<Option<Meter>> {
        Ok(self.state.read().await.meters.iter().find(|m| m.id == meter_id).cloned())
    }

    async fn fetch_group_meters(&self, group_id: GroupId) -> Result<Option<Vec<MeterId>>> {
        let state = self.state.read().await;
        if !state.groups.contains_key(&group_id) {
            return Ok(None);
        }

        let mut meters = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut pending = vec![group_id];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(members) = state.groups.get(&id) {
                meters.extend(members.meters.iter().copied());
                pending.extend(members.children.iter().copied());
            }
        }
        Ok(Some(meters.into_iter().collect()))
    }

    async fn replace_canonical_readings(&self, meter_id: MeterId, readings: &[Reading], should_update: bool) -> Result<u64> {
        let mut state = self.state.write().await;
        let stored = state.readings.entry(meter_id).or_default();
        let before = if should_update { 0 } else { stored.len() };
        let merged = merge_readings(stored, readings, should_update);
        let written = if should_update {
            readings.len()
        } else {
            merged.len() - before
        };
        *stored = merged;
        Ok(written as u64)
    }
}
