pub mod reading_queries;
pub mod unit_queries;
