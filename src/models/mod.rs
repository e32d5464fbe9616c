//! Domain models
//!
//! Jobs, their tagged kind payloads, execution records and the caller
//! identity every lifecycle operation is scoped by.

pub mod execution;
pub mod identity;
pub mod job;

pub use execution::{ExecutionRecord, ExecutionStatus, JobStats};
pub use identity::{CallerIdentity, Role};
pub use job::{
    HttpPayload, Job, JobCreateRequest, JobFilter, JobKind, JobType, JobUpdateRequest,
    ShellPayload, validate_name, validate_retry_limit, validate_webhook_url,
};
