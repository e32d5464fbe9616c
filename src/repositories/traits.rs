//! Repository trait definitions
//!
//! The orchestrator, dependency validator and execution pipeline only see the
//! job store through [`JobStore`], so they can be exercised against any
//! backend that honors these semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RepositoryResult;
use crate::models::{ExecutionRecord, Job, JobFilter};

/// Durable storage for jobs and their execution history
///
/// Every job lookup that takes an `organization_id` must treat a job owned
/// by another organization exactly like a missing one.
///
/// # Examples
///
/// ```rust,ignore
/// use cron_orchestrator::repositories::JobStore;
///
/// async fn last_outcome<S: JobStore>(store: &S, job_id: Uuid) -> RepositoryResult<bool> {
///     let latest = store.find_latest_execution_record(job_id).await?;
///     Ok(latest.is_some_and(|record| record.is_success()))
/// }
/// ```
#[async_trait]
pub trait JobStore: Send + Sync {
    /// List jobs matching the filter, oldest first
    async fn find(&self, filter: JobFilter) -> RepositoryResult<Vec<Job>>;

    /// Find one job inside an organization
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Job))` - Job exists and belongs to `organization_id`
    /// * `Ok(None)` - Job is absent or owned by another organization
    /// * `Err(RepositoryError)` - Database or mapping error
    async fn find_one(&self, id: Uuid, organization_id: Uuid) -> RepositoryResult<Option<Job>>;

    /// Fetch the subset of `ids` that exist inside the organization
    async fn find_by_ids(&self, ids: &[Uuid], organization_id: Uuid)
    -> RepositoryResult<Vec<Job>>;

    /// Jobs in the organization whose dependency list contains `job_id`
    async fn find_dependents(
        &self,
        job_id: Uuid,
        organization_id: Uuid,
    ) -> RepositoryResult<Vec<Job>>;

    /// Persist a new job
    async fn create(&self, job: Job) -> RepositoryResult<Job>;

    /// Overwrite an existing job, scoped by its `organization_id`
    ///
    /// # Returns
    ///
    /// * `Err(RepositoryError::RecordNotFound)` - No such job in that organization
    async fn update(&self, job: Job) -> RepositoryResult<Job>;

    /// Delete a job and its execution history
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Job was deleted
    /// * `Ok(false)` - Nothing matched `id` inside `organization_id`
    async fn delete(&self, id: Uuid, organization_id: Uuid) -> RepositoryResult<bool>;

    /// Most recent record for the job, by `executed_at`
    async fn find_latest_execution_record(
        &self,
        job_id: Uuid,
    ) -> RepositoryResult<Option<ExecutionRecord>>;

    /// Append an immutable record
    async fn append_execution_record(
        &self,
        record: ExecutionRecord,
    ) -> RepositoryResult<ExecutionRecord>;

    /// Newest-first history, at most `limit` entries
    async fn list_execution_records(
        &self,
        job_id: Uuid,
        limit: u64,
    ) -> RepositoryResult<Vec<ExecutionRecord>>;

    /// Remove all history for a job, returning the number of rows removed
    async fn delete_execution_records(&self, job_id: Uuid) -> RepositoryResult<u64>;

    /// Number of distinct jobs in the organization with a record at or after `since`
    async fn count_jobs_executed_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<u64>;
}
