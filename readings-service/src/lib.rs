pub mod aggregate;
pub mod compare;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod sinks;
pub mod sources;
pub mod transform;
pub mod units;

pub use error::{ReadingsError, Result};
pub use pipeline::{Envelope, Pipeline};
pub use query::{LineConfig, LineSeries, ReadingsQuery, Target};
