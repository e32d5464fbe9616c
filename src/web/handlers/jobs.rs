//! Job HTTP handlers
//!
//! Thin wrappers around [`JobOrchestrator`]: parse, call, map the result.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::job_scheduling::{FireOutcome, JobOrchestrator, SkipReason};
use crate::models::{
    CallerIdentity, ExecutionRecord, Job, JobCreateRequest, JobType, JobUpdateRequest,
};
use crate::web::{
    AppState,
    extractors::HistoryParams,
    responses::{created, no_content, ok},
    utils::extract_job_id,
};

/// Job as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub payload: Value,
    pub schedule: String,
    pub enabled: bool,
    pub retry_limit: u32,
    pub webhook_url: Option<String>,
    pub depends_on: Vec<Uuid>,
    pub is_scheduled: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobResponse {
    async fn build(orchestrator: &JobOrchestrator, job: Job) -> Self {
        Self {
            is_scheduled: orchestrator.is_scheduled(job.id).await,
            next_run_at: orchestrator.next_run_at(&job),
            job_type: job.kind.job_type(),
            payload: job.kind.payload_json(),
            id: job.id,
            owner_id: job.owner_id,
            organization_id: job.organization_id,
            name: job.name,
            schedule: job.schedule,
            enabled: job.enabled,
            retry_limit: job.retry_limit,
            webhook_url: job.webhook_url,
            depends_on: job.depends_on,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Result of a manual run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    /// `recorded`, `skipped` or `already_running`
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ExecutionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<FireOutcome> for RunResponse {
    fn from(outcome: FireOutcome) -> Self {
        match outcome {
            FireOutcome::Recorded(record) => Self {
                outcome: "recorded".into(),
                record: Some(record),
                reason: None,
            },
            FireOutcome::Skipped(reason) => Self {
                outcome: "skipped".into(),
                record: None,
                reason: Some(match reason {
                    SkipReason::JobMissing => "job no longer exists".to_string(),
                    SkipReason::JobDisabled => "job is disabled".to_string(),
                    SkipReason::DependencyNotReady { dependency, reason } => {
                        format!("dependency {dependency} not ready: {reason}")
                    }
                }),
            },
            FireOutcome::AlreadyRunning => Self {
                outcome: "already_running".into(),
                record: None,
                reason: Some("a previous run is still in progress".into()),
            },
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

pub async fn create_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    payload: Result<Json<JobCreateRequest>, JsonRejection>,
) -> AppResult<Response> {
    let request = json_body(payload)?;
    let job = state.orchestrator.create(&identity, request).await?;
    Ok(created(JobResponse::build(&state.orchestrator, job).await))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> AppResult<Response> {
    let jobs = state.orchestrator.list(&identity).await?;
    let mut responses = Vec::with_capacity(jobs.len());
    for job in jobs {
        responses.push(JobResponse::build(&state.orchestrator, job).await);
    }
    Ok(ok(responses))
}

pub async fn get_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job = state
        .orchestrator
        .get(&identity, extract_job_id(&id)?)
        .await?;
    Ok(ok(JobResponse::build(&state.orchestrator, job).await))
}

pub async fn update_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
    payload: Result<Json<JobUpdateRequest>, JsonRejection>,
) -> AppResult<Response> {
    let id = extract_job_id(&id)?;
    let request = json_body(payload)?;
    let job = state.orchestrator.update(&identity, id, request).await?;
    Ok(ok(JobResponse::build(&state.orchestrator, job).await))
}

pub async fn delete_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state
        .orchestrator
        .delete(&identity, extract_job_id(&id)?)
        .await?;
    Ok(no_content())
}

pub async fn toggle_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job = state
        .orchestrator
        .toggle(&identity, extract_job_id(&id)?)
        .await?;
    Ok(ok(JobResponse::build(&state.orchestrator, job).await))
}

pub async fn run_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let outcome = state
        .orchestrator
        .run_now(&identity, extract_job_id(&id)?)
        .await?;
    Ok(ok(RunResponse::from(outcome)))
}

pub async fn list_executions(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
    params: HistoryParams,
) -> AppResult<Response> {
    let records = state
        .orchestrator
        .history(&identity, extract_job_id(&id)?, params.limit)
        .await?;
    Ok(ok(records))
}

pub async fn job_stats(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> AppResult<Response> {
    Ok(ok(state.orchestrator.stats(&identity).await?))
}
