//! Web utility functions

use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Parse a job id path segment
///
/// A malformed id cannot name any job, so it is reported as not found.
pub fn extract_job_id(param: &str) -> AppResult<Uuid> {
    Uuid::parse_str(param).map_err(|_| AppError::not_found("Job", param))
}
