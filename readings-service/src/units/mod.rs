//! Unit conversion graph: path search, rate scaling and the shared snapshot cache.

mod cache;
pub(crate) mod graph;
mod transform;

pub use cache::UnitGraphCache;
pub use graph::{UnitGraph, UnitOptions, CANONICAL_SEC_IN_RATE};
pub use transform::LinearTransform;
