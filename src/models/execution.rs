//! Execution history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// Immutable outcome of one invocation (the whole retry loop, not one attempt)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub organization_id: Uuid,
    /// When the invocation finished, after its last attempt
    pub executed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    /// Number of attempts actually made
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Attempt index at which the final outcome was reached
    pub retry_count: u32,
}

impl ExecutionRecord {
    pub fn success(job_id: Uuid, organization_id: Uuid, retry_count: u32, output: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            organization_id,
            executed_at: Utc::now(),
            status: ExecutionStatus::Success,
            attempts: retry_count + 1,
            output: Some(output),
            error: None,
            retry_count,
        }
    }

    pub fn failure(job_id: Uuid, organization_id: Uuid, retry_count: u32, error: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            organization_id,
            executed_at: Utc::now(),
            status: ExecutionStatus::Failure,
            attempts: retry_count + 1,
            output: None,
            error: Some(error),
            retry_count,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Organization-wide job counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total_jobs: u64,
    pub enabled_jobs: u64,
    pub disabled_jobs: u64,
    pub scheduled_triggers: u64,
    pub jobs_run_last_24h: u64,
}
