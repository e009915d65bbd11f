pub mod db;
pub mod domain;
pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use store::{PgReadingStore, ReadingStore};
