pub use super::execution_records::Entity as ExecutionRecords;
pub use super::jobs::Entity as Jobs;
