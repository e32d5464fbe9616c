//! SeaORM-based job store implementation
//!
//! Payloads and dependency lists are stored as JSON text so the schema stays
//! identical across SQLite, PostgreSQL and MySQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    execution_records,
    jobs,
    prelude::{ExecutionRecords, Jobs},
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    ExecutionRecord, ExecutionStatus, HttpPayload, Job, JobFilter, JobKind, JobType,
    ShellPayload,
};
use crate::repositories::traits::JobStore;

/// SeaORM-based repository for jobs and execution records
#[derive(Clone)]
pub struct JobSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl JobSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn corrupt(table: &str, id: Uuid, message: impl Into<String>) -> RepositoryError {
        RepositoryError::CorruptRecord {
            table: table.to_string(),
            id: id.to_string(),
            message: message.into(),
        }
    }

    fn job_from_model(model: jobs::Model) -> RepositoryResult<Job> {
        let job_type = JobType::from_str(&model.kind)
            .map_err(|_| Self::corrupt("jobs", model.id, format!("unknown kind '{}'", model.kind)))?;
        let kind = match job_type {
            JobType::Http => JobKind::Http(serde_json::from_str::<HttpPayload>(&model.payload)?),
            JobType::Shell => JobKind::Shell(serde_json::from_str::<ShellPayload>(&model.payload)?),
        };
        let depends_on: Vec<Uuid> = serde_json::from_str(&model.depends_on)?;
        let retry_limit = u32::try_from(model.retry_limit)
            .map_err(|_| Self::corrupt("jobs", model.id, "negative retry_limit"))?;

        Ok(Job {
            id: model.id,
            owner_id: model.owner_id,
            organization_id: model.organization_id,
            name: model.name,
            kind,
            schedule: model.schedule,
            enabled: model.enabled,
            retry_limit,
            webhook_url: model.webhook_url,
            depends_on,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    fn job_to_active_model(job: &Job) -> RepositoryResult<jobs::ActiveModel> {
        let payload = match &job.kind {
            JobKind::Http(http) => serde_json::to_string(http)?,
            JobKind::Shell(shell) => serde_json::to_string(shell)?,
        };

        Ok(jobs::ActiveModel {
            id: Set(job.id),
            owner_id: Set(job.owner_id),
            organization_id: Set(job.organization_id),
            name: Set(job.name.clone()),
            kind: Set(job.kind.job_type().to_string()),
            schedule: Set(job.schedule.clone()),
            payload: Set(payload),
            enabled: Set(job.enabled),
            retry_limit: Set(i32::try_from(job.retry_limit).unwrap_or(i32::MAX)),
            webhook_url: Set(job.webhook_url.clone()),
            depends_on: Set(serde_json::to_string(&job.depends_on)?),
            created_at: Set(job.created_at),
            updated_at: Set(job.updated_at),
        })
    }

    fn record_from_model(model: execution_records::Model) -> RepositoryResult<ExecutionRecord> {
        let status = ExecutionStatus::from_str(&model.status).map_err(|_| {
            Self::corrupt(
                "execution_records",
                model.id,
                format!("unknown status '{}'", model.status),
            )
        })?;

        Ok(ExecutionRecord {
            id: model.id,
            job_id: model.job_id,
            organization_id: model.organization_id,
            executed_at: model.executed_at,
            status,
            attempts: u32::try_from(model.attempts).unwrap_or_default(),
            output: model.output.as_deref().map(serde_json::from_str).transpose()?,
            error: model.error.as_deref().map(serde_json::from_str).transpose()?,
            retry_count: u32::try_from(model.retry_count).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl JobStore for JobSeaOrmRepository {
    async fn find(&self, filter: JobFilter) -> RepositoryResult<Vec<Job>> {
        let mut query = Jobs::find();
        if let Some(organization_id) = filter.organization_id {
            query = query.filter(jobs::Column::OrganizationId.eq(organization_id));
        }
        if let Some(enabled) = filter.enabled {
            query = query.filter(jobs::Column::Enabled.eq(enabled));
        }

        let models = query
            .order_by_asc(jobs::Column::CreatedAt)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(Self::job_from_model).collect()
    }

    async fn find_one(&self, id: Uuid, organization_id: Uuid) -> RepositoryResult<Option<Job>> {
        let model = Jobs::find_by_id(id)
            .filter(jobs::Column::OrganizationId.eq(organization_id))
            .one(&*self.connection)
            .await?;
        model.map(Self::job_from_model).transpose()
    }

    async fn find_by_ids(
        &self,
        ids: &[Uuid],
        organization_id: Uuid,
    ) -> RepositoryResult<Vec<Job>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = Jobs::find()
            .filter(jobs::Column::Id.is_in(ids.iter().copied()))
            .filter(jobs::Column::OrganizationId.eq(organization_id))
            .all(&*self.connection)
            .await?;
        models.into_iter().map(Self::job_from_model).collect()
    }

    async fn find_dependents(
        &self,
        job_id: Uuid,
        organization_id: Uuid,
    ) -> RepositoryResult<Vec<Job>> {
        // LIKE narrows the scan; the parsed list is authoritative
        let models = Jobs::find()
            .filter(jobs::Column::OrganizationId.eq(organization_id))
            .filter(jobs::Column::DependsOn.contains(job_id.to_string()))
            .all(&*self.connection)
            .await?;

        let mut dependents = Vec::new();
        for model in models {
            let job = Self::job_from_model(model)?;
            if job.depends_on.contains(&job_id) {
                dependents.push(job);
            }
        }
        Ok(dependents)
    }

    async fn create(&self, job: Job) -> RepositoryResult<Job> {
        let active_model = Self::job_to_active_model(&job)?;
        let model = active_model.insert(&*self.connection).await?;
        debug!("Persisted job {} ({})", model.id, model.name);
        Self::job_from_model(model)
    }

    async fn update(&self, job: Job) -> RepositoryResult<Job> {
        let active_model = Self::job_to_active_model(&job)?;
        let result = Jobs::update(active_model)
            .filter(jobs::Column::OrganizationId.eq(job.organization_id))
            .exec(&*self.connection)
            .await;

        match result {
            Ok(model) => Self::job_from_model(model),
            Err(DbErr::RecordNotUpdated) => Err(RepositoryError::RecordNotFound {
                table: "jobs".to_string(),
                field: "id".to_string(),
                value: job.id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid, organization_id: Uuid) -> RepositoryResult<bool> {
        let txn = self.connection.begin().await?;

        let deleted = Jobs::delete_many()
            .filter(jobs::Column::Id.eq(id))
            .filter(jobs::Column::OrganizationId.eq(organization_id))
            .exec(&txn)
            .await?;

        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        let history = ExecutionRecords::delete_many()
            .filter(execution_records::Column::JobId.eq(id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        debug!(
            "Deleted job {} and {} execution records",
            id, history.rows_affected
        );
        Ok(true)
    }

    async fn find_latest_execution_record(
        &self,
        job_id: Uuid,
    ) -> RepositoryResult<Option<ExecutionRecord>> {
        let model = ExecutionRecords::find()
            .filter(execution_records::Column::JobId.eq(job_id))
            .order_by_desc(execution_records::Column::ExecutedAt)
            .one(&*self.connection)
            .await?;
        model.map(Self::record_from_model).transpose()
    }

    async fn append_execution_record(
        &self,
        record: ExecutionRecord,
    ) -> RepositoryResult<ExecutionRecord> {
        let output = record.output.as_ref().map(serde_json::to_string).transpose()?;
        let error = record.error.as_ref().map(serde_json::to_string).transpose()?;

        let active_model = execution_records::ActiveModel {
            id: Set(record.id),
            job_id: Set(record.job_id),
            organization_id: Set(record.organization_id),
            executed_at: Set(record.executed_at),
            status: Set(record.status.to_string()),
            attempts: Set(i32::try_from(record.attempts).unwrap_or(i32::MAX)),
            output: Set(output),
            error: Set(error),
            retry_count: Set(i32::try_from(record.retry_count).unwrap_or(i32::MAX)),
        };

        let model = active_model.insert(&*self.connection).await?;
        Self::record_from_model(model)
    }

    async fn list_execution_records(
        &self,
        job_id: Uuid,
        limit: u64,
    ) -> RepositoryResult<Vec<ExecutionRecord>> {
        let models = ExecutionRecords::find()
            .filter(execution_records::Column::JobId.eq(job_id))
            .order_by_desc(execution_records::Column::ExecutedAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(Self::record_from_model).collect()
    }

    async fn delete_execution_records(&self, job_id: Uuid) -> RepositoryResult<u64> {
        let result = ExecutionRecords::delete_many()
            .filter(execution_records::Column::JobId.eq(job_id))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    async fn count_jobs_executed_since(
        &self,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let job_ids: Vec<Uuid> = ExecutionRecords::find()
            .select_only()
            .column(execution_records::Column::JobId)
            .filter(execution_records::Column::OrganizationId.eq(organization_id))
            .filter(execution_records::Column::ExecutedAt.gte(since))
            .distinct()
            .into_tuple()
            .all(&*self.connection)
            .await?;
        Ok(job_ids.len() as u64)
    }
}
