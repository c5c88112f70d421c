pub mod directory_queries;
pub mod reading_queries;
pub mod summary_queries;
