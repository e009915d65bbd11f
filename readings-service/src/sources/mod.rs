pub mod memory_rows;
pub mod readings_file;

pub use memory_rows::MemoryRowsSource;
pub use readings_file::ReadingsFileSource;
