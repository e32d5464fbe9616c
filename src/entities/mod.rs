//! SeaORM entities backing the job store

pub mod prelude;

pub mod execution_records;
pub mod jobs;
