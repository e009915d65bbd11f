pub mod canonical;

pub use canonical::CanonicalReadingsSink;
