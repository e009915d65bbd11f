use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use readings_client::{domain::UnitId, ReadingStore};
use tokio::sync::RwLock;

use super::{LinearTransform, UnitGraph};
use crate::error::{ReadingsError, Result};

/// Process-wide holder of the current unit graph snapshot.
///
/// Snapshots are built lazily from the store and dropped by [`invalidate`],
/// which must be called once a unit or conversion edit commits. Because
/// invalidation takes the write lock, no read that starts after it returns can
/// see the old snapshot.
///
/// [`invalidate`]: UnitGraphCache::invalidate
#[derive(Debug, Default)]
pub struct UnitGraphCache {
    snapshot: RwLock<Option<Arc<UnitGraph>>>,
    generation: AtomicU64,
}

impl UnitGraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn graph<S>(&self, store: &S) -> Result<Arc<UnitGraph>>
    where
        S: ReadingStore + ?Sized,
    {
        if let Some(graph) = self.snapshot.read().await.as_ref() {
            self.check_current(graph)?;
            return Ok(Arc::clone(graph));
        }

        let mut slot = self.snapshot.write().await;
        if let Some(graph) = slot.as_ref() {
            return Ok(Arc::clone(graph));
        }

        let generation = self.generation.load(Ordering::Acquire);
        let units = store.fetch_units().await?;
        let conversions = store.fetch_conversions().await?;
        let graph = Arc::new(UnitGraph::build(units, &conversions, generation)?);

        metrics::counter!("unit_graph_rebuilds_total").increment(1);
        tracing::debug!(
            generation,
            units = graph.units().len(),
            conversions = conversions.len(),
            "unit graph rebuilt"
        );

        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }

    pub async fn resolve<S>(&self, store: &S, source_id: UnitId, destination_id: UnitId) -> Result<LinearTransform>
    where
        S: ReadingStore + ?Sized,
    {
        self.graph(store).await?.resolve(source_id, destination_id)
    }

    /// Drop the current snapshot; the next read rebuilds it.
    pub async fn invalidate(&self) {
        let mut slot = self.snapshot.write().await;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *slot = None;
        tracing::info!(generation, "unit graph invalidated");
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn check_current(&self, graph: &UnitGraph) -> Result<()> {
        let current = self.generation();
        if graph.generation() == current {
            return Ok(());
        }
        tracing::error!(seen = graph.generation(), current, "stale unit graph snapshot");
        debug_assert_eq!(graph.generation(), current, "stale unit graph snapshot");
        Err(ReadingsError::StaleCache {
            seen: graph.generation(),
            current,
        })
    }
}
