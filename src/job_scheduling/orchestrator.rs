//! Job lifecycle orchestration
//!
//! Every lifecycle operation takes the job's [`TriggerSlot`] first and holds
//! it across load, persist and trigger sync, so concurrent operations on one
//! job are applied one after another and leave exactly the trigger the final
//! persisted state calls for. Operations that change the dependency graph
//! additionally serialize on a graph-wide lock so two concurrent edits can't
//! each pass cycle detection and together close a cycle.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cron::Schedule;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dependency::DependencyValidator;
use super::executor::JobExecutor;
use super::pipeline::{ExecutionPipeline, FireOutcome};
use super::trigger_registry::{TriggerRegistry, TriggerSlot};
use super::webhook::HttpWebhookNotifier;
use crate::config::SchedulerConfig;
use crate::config::defaults::MAX_HISTORY_LIMIT;
use crate::errors::{AppError, AppResult, DependencyError};
use crate::models::{
    CallerIdentity, ExecutionRecord, Job, JobCreateRequest, JobFilter, JobKind, JobStats,
    JobUpdateRequest, validate_name, validate_retry_limit, validate_webhook_url,
};
use crate::repositories::JobStore;
use crate::utils::{calculate_next_scheduled_time, parse_schedule};

/// Result of the startup reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scheduled: usize,
    /// Enabled jobs whose stored schedule could not be parsed
    pub skipped: Vec<Uuid>,
}

pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    validator: DependencyValidator,
    registry: Arc<TriggerRegistry>,
    pipeline: Arc<ExecutionPipeline>,
    graph_edits: Mutex<()>,
}

fn parse_cron(expr: &str) -> AppResult<Schedule> {
    parse_schedule(expr).map_err(AppError::validation)
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<TriggerRegistry>,
        pipeline: Arc<ExecutionPipeline>,
    ) -> Self {
        Self {
            validator: DependencyValidator::new(store.clone()),
            store,
            registry,
            pipeline,
            graph_edits: Mutex::new(()),
        }
    }

    /// Orchestrator with the reqwest/process executors and HTTP webhooks
    pub fn from_config(store: Arc<dyn JobStore>, config: &SchedulerConfig) -> AppResult<Self> {
        let pipeline = ExecutionPipeline::new(
            store.clone(),
            DependencyValidator::new(store.clone()),
            JobExecutor::from_config(config)?,
            Arc::new(HttpWebhookNotifier::new(config.webhook_timeout)?),
        )
        .with_retry_backoff(config.retry_backoff);

        Ok(Self::new(
            store,
            Arc::new(TriggerRegistry::new()),
            Arc::new(pipeline),
        ))
    }

    pub fn registry(&self) -> &Arc<TriggerRegistry> {
        &self.registry
    }

    pub async fn create(
        &self,
        identity: &CallerIdentity,
        request: JobCreateRequest,
    ) -> AppResult<Job> {
        let organization_id = identity.organization_id;
        let name = validate_name(&request.name)?;
        let kind = JobKind::from_parts(&request.job_type, request.payload)?;
        let schedule_expr = request.schedule.trim().to_string();
        let schedule = parse_cron(&schedule_expr)?;
        let retry_limit = validate_retry_limit(request.retry_limit.unwrap_or(0))?;
        let webhook_url = validate_webhook_url(request.webhook_url.as_deref())?;

        let job_id = Uuid::new_v4();
        let mut slot = self.registry.lock(job_id).await;
        let _graph = self.graph_edits.lock().await;

        let depends_on = self
            .validator
            .validate(&request.depends_on, organization_id)
            .await?;
        self.validator
            .detect_cycle(job_id, &depends_on, organization_id)
            .await?;

        let now = Utc::now();
        let job = self
            .store
            .create(Job {
                id: job_id,
                owner_id: identity.user_id,
                organization_id,
                name,
                kind,
                schedule: schedule_expr,
                enabled: request.enabled.unwrap_or(true),
                retry_limit,
                webhook_url,
                depends_on,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if job.enabled {
            slot.install(
                &job.schedule,
                schedule,
                self.pipeline.fire_fn(job.id, organization_id),
            );
        }
        info!(
            "Created {} job {} ({}) schedule '{}' enabled={}",
            job.kind.job_type(),
            job.id,
            job.name,
            job.schedule,
            job.enabled
        );
        Ok(job)
    }

    /// Apply the fields present in `request`
    pub async fn update(
        &self,
        identity: &CallerIdentity,
        id: Uuid,
        request: JobUpdateRequest,
    ) -> AppResult<Job> {
        let organization_id = identity.organization_id;
        let mut slot = self.registry.lock(id).await;
        let mut job = self.load(id, organization_id).await?;

        if let Some(name) = &request.name {
            job.name = validate_name(name)?;
        }
        job.kind = match (request.job_type.as_deref(), request.payload) {
            (None, None) => job.kind,
            (Some(job_type), Some(payload)) => JobKind::from_parts(job_type, payload)?,
            (Some(job_type), None) => JobKind::from_parts(job_type, job.kind.payload_json())?,
            (None, Some(payload)) => {
                JobKind::from_parts(job.kind.job_type().as_ref(), payload)?
            }
        };
        if let Some(schedule) = &request.schedule {
            let schedule = schedule.trim();
            parse_cron(schedule)?;
            job.schedule = schedule.to_string();
        }
        if let Some(enabled) = request.enabled {
            job.enabled = enabled;
        }
        if let Some(retry_limit) = request.retry_limit {
            job.retry_limit = validate_retry_limit(retry_limit)?;
        }
        if let Some(webhook_url) = &request.webhook_url {
            job.webhook_url = validate_webhook_url(Some(webhook_url))?;
        }

        let _graph = match &request.depends_on {
            Some(candidate) => {
                let graph = self.graph_edits.lock().await;
                let depends_on = self.validator.validate(candidate, organization_id).await?;
                self.validator
                    .detect_cycle(id, &depends_on, organization_id)
                    .await?;
                job.depends_on = depends_on;
                Some(graph)
            }
            None => None,
        };

        job.updated_at = Utc::now();
        let job = self.store.update(job).await?;
        self.sync_trigger(&mut slot, &job)?;

        info!(
            "Updated job {} ({}) schedule '{}' enabled={}",
            job.id, job.name, job.schedule, job.enabled
        );
        Ok(job)
    }

    /// Delete a job, its trigger and its history
    ///
    /// Waits for an in-flight run of the job so its record is removed with
    /// the rest of the history.
    pub async fn delete(&self, identity: &CallerIdentity, id: Uuid) -> AppResult<()> {
        let organization_id = identity.organization_id;
        let mut slot = self.registry.lock(id).await;
        let job = self.load(id, organization_id).await?;
        let _running = self.pipeline.claim(id).await;
        let _graph = self.graph_edits.lock().await;

        let dependents = self.store.find_dependents(id, organization_id).await?;
        if !dependents.is_empty() {
            return Err(DependencyError::HasDependents {
                ids: dependents.iter().map(|job| job.id).collect(),
            }
            .into());
        }

        let was_scheduled = slot.remove();
        match self.store.delete(id, organization_id).await {
            Ok(true) => {
                info!("Deleted job {} ({})", job.id, job.name);
                Ok(())
            }
            Ok(false) => Err(AppError::not_found("Job", id)),
            Err(e) => {
                if was_scheduled {
                    if let Err(reinstall) = self.sync_trigger(&mut slot, &job) {
                        error!(
                            "Failed to restore trigger for job {} after failed delete: {}",
                            id, reinstall
                        );
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Flip the enabled flag and start or stop the trigger accordingly
    pub async fn toggle(&self, identity: &CallerIdentity, id: Uuid) -> AppResult<Job> {
        let mut slot = self.registry.lock(id).await;
        let mut job = self.load(id, identity.organization_id).await?;

        job.enabled = !job.enabled;
        job.updated_at = Utc::now();
        let job = self.store.update(job).await?;
        self.sync_trigger(&mut slot, &job)?;

        info!(
            "Job {} ({}) {}",
            job.id,
            job.name,
            if job.enabled { "enabled" } else { "disabled" }
        );
        Ok(job)
    }

    pub async fn get(&self, identity: &CallerIdentity, id: Uuid) -> AppResult<Job> {
        self.load(id, identity.organization_id).await
    }

    pub async fn list(&self, identity: &CallerIdentity) -> AppResult<Vec<Job>> {
        Ok(self
            .store
            .find(JobFilter::organization(identity.organization_id))
            .await?)
    }

    /// Newest-first execution records; `limit` is clamped to 1..=MAX_HISTORY_LIMIT
    pub async fn history(
        &self,
        identity: &CallerIdentity,
        id: Uuid,
        limit: u64,
    ) -> AppResult<Vec<ExecutionRecord>> {
        self.load(id, identity.organization_id).await?;
        Ok(self
            .store
            .list_execution_records(id, limit.clamp(1, MAX_HISTORY_LIMIT))
            .await?)
    }

    /// Run the pipeline once now, regardless of the enabled flag
    pub async fn run_now(&self, identity: &CallerIdentity, id: Uuid) -> AppResult<FireOutcome> {
        let job = self.load(id, identity.organization_id).await?;
        info!("Manual run requested for job {} ({})", job.id, job.name);
        self.pipeline.run(&job).await
    }

    /// Organization-wide job statistics, admin only
    pub async fn stats(&self, identity: &CallerIdentity) -> AppResult<JobStats> {
        if !identity.is_admin() {
            return Err(AppError::permission_denied("read", "job statistics"));
        }
        let jobs = self.list(identity).await?;

        let mut stats = JobStats {
            total_jobs: jobs.len() as u64,
            ..JobStats::default()
        };
        for job in &jobs {
            if job.enabled {
                stats.enabled_jobs += 1;
            } else {
                stats.disabled_jobs += 1;
            }
            if self.registry.is_scheduled(job.id).await {
                stats.scheduled_triggers += 1;
            }
        }
        stats.jobs_run_last_24h = self
            .store
            .count_jobs_executed_since(
                identity.organization_id,
                Utc::now() - ChronoDuration::hours(24),
            )
            .await?;
        Ok(stats)
    }

    /// Pipeline invocations currently in flight
    pub fn running_count(&self) -> usize {
        self.pipeline.running_count()
    }

    pub async fn is_scheduled(&self, id: Uuid) -> bool {
        self.registry.is_scheduled(id).await
    }

    /// Next fire time for enabled jobs
    pub fn next_run_at(&self, job: &Job) -> Option<DateTime<Utc>> {
        job.enabled
            .then(|| calculate_next_scheduled_time(&job.schedule))
            .flatten()
    }

    /// Rebuild the trigger registry from every enabled job in the store
    ///
    /// A store failure is returned to the caller; startup must not continue
    /// with an empty registry. Jobs whose stored schedule no longer parses
    /// are logged and left unscheduled.
    pub async fn reconcile(&self) -> AppResult<ReconcileReport> {
        let jobs = self.store.find(JobFilter::enabled()).await?;
        let mut report = ReconcileReport::default();

        for job in jobs {
            let mut slot = self.registry.lock(job.id).await;
            match parse_cron(&job.schedule) {
                Ok(schedule) => {
                    slot.install(
                        &job.schedule,
                        schedule,
                        self.pipeline.fire_fn(job.id, job.organization_id),
                    );
                    report.scheduled += 1;
                }
                Err(e) => {
                    warn!("Not scheduling job {} ({}): {}", job.id, job.name, e);
                    report.skipped.push(job.id);
                }
            }
        }

        info!(
            "Reconciled trigger registry: {} scheduled, {} skipped",
            report.scheduled,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Stop every trigger
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    async fn load(&self, id: Uuid, organization_id: Uuid) -> AppResult<Job> {
        self.store
            .find_one(id, organization_id)
            .await?
            .ok_or_else(|| AppError::not_found("Job", id))
    }

    fn sync_trigger(&self, slot: &mut TriggerSlot<'_>, job: &Job) -> AppResult<()> {
        slot.remove();
        if job.enabled {
            let schedule = parse_cron(&job.schedule)?;
            slot.install(
                &job.schedule,
                schedule,
                self.pipeline.fire_fn(job.id, job.organization_id),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::{ExecutionStatus, Role, ShellPayload};
    use crate::repositories::JobSeaOrmRepository;
    use serde_json::json;

    const NEVER: &str = "0 0 1 1 *";

    struct Fixture {
        store: Arc<dyn JobStore>,
        orchestrator: Arc<JobOrchestrator>,
        user: CallerIdentity,
    }

    async fn fixture() -> Fixture {
        let db = Database::new_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let store: Arc<dyn JobStore> = Arc::new(JobSeaOrmRepository::new(db.connection.clone()));
        let orchestrator =
            JobOrchestrator::from_config(store.clone(), &SchedulerConfig::default()).unwrap();
        Fixture {
            store,
            orchestrator: Arc::new(orchestrator),
            user: CallerIdentity::new(Uuid::new_v4(), Uuid::new_v4(), Role::User),
        }
    }

    fn shell_request(name: &str, command: &str) -> JobCreateRequest {
        JobCreateRequest {
            name: name.into(),
            job_type: "shell".into(),
            schedule: NEVER.into(),
            payload: json!({"command": command}),
            enabled: None,
            retry_limit: None,
            webhook_url: None,
            depends_on: vec![],
        }
    }

    #[tokio::test]
    async fn create_schedules_enabled_jobs_only() {
        let f = fixture().await;
        let enabled = f
            .orchestrator
            .create(&f.user, shell_request("on", "true"))
            .await
            .unwrap();
        let disabled = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    enabled: Some(false),
                    ..shell_request("off", "true")
                },
            )
            .await
            .unwrap();

        assert!(f.orchestrator.is_scheduled(enabled.id).await);
        assert!(!f.orchestrator.is_scheduled(disabled.id).await);
        assert_eq!(enabled.retry_limit, 0);
        assert_eq!(enabled.owner_id, f.user.user_id);
        assert!(f.orchestrator.next_run_at(&enabled).is_some());
        assert!(f.orchestrator.next_run_at(&disabled).is_none());
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn invalid_create_persists_nothing() {
        let f = fixture().await;
        let bad_cron = JobCreateRequest {
            schedule: "every minute".into(),
            ..shell_request("bad", "true")
        };
        let bad_payload = JobCreateRequest {
            job_type: "http".into(),
            payload: json!({"url": "https://example.com"}),
            ..shell_request("bad", "true")
        };
        let bad_dep = JobCreateRequest {
            depends_on: vec![Uuid::new_v4().to_string()],
            ..shell_request("bad", "true")
        };

        assert!(matches!(
            f.orchestrator.create(&f.user, bad_cron).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            f.orchestrator.create(&f.user, bad_payload).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            f.orchestrator.create(&f.user, bad_dep).await,
            Err(AppError::Dependency(DependencyError::Missing { .. }))
        ));
        assert!(f.orchestrator.list(&f.user).await.unwrap().is_empty());
        assert_eq!(f.orchestrator.registry().scheduled_count(), 0);
    }

    #[tokio::test]
    async fn schedule_update_keeps_single_trigger() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(&f.user, shell_request("nightly", "true"))
            .await
            .unwrap();

        let updated = f
            .orchestrator
            .update(
                &f.user,
                job.id,
                JobUpdateRequest {
                    schedule: Some("30 2 * * *".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.schedule, "30 2 * * *");
        assert_eq!(f.orchestrator.registry().scheduled_count(), 1);
        assert_eq!(
            f.orchestrator.registry().cron_expr(job.id).await.as_deref(),
            Some("30 2 * * *")
        );
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn partial_update_changes_only_given_fields() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    retry_limit: Some(3),
                    webhook_url: Some("https://hooks.example.com/a".into()),
                    ..shell_request("report", "echo one")
                },
            )
            .await
            .unwrap();

        let updated = f
            .orchestrator
            .update(
                &f.user,
                job.id,
                JobUpdateRequest {
                    payload: Some(json!({"command": "echo two"})),
                    webhook_url: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "report");
        assert_eq!(updated.retry_limit, 3);
        assert_eq!(updated.webhook_url, None);
        assert_eq!(
            updated.kind,
            JobKind::Shell(ShellPayload {
                command: "echo two".into()
            })
        );
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn rejected_cycle_leaves_prior_edges() {
        let f = fixture().await;
        let a = f
            .orchestrator
            .create(&f.user, shell_request("a", "true"))
            .await
            .unwrap();
        let b = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    depends_on: vec![a.id.to_string()],
                    ..shell_request("b", "true")
                },
            )
            .await
            .unwrap();

        let err = f
            .orchestrator
            .update(
                &f.user,
                a.id,
                JobUpdateRequest {
                    depends_on: Some(vec![b.id.to_string()]),
                    name: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Dependency(DependencyError::Cycle { ref path }) if path == &vec![a.id, b.id, a.id]
        ));
        let stored = f.orchestrator.get(&f.user, a.id).await.unwrap();
        assert!(stored.depends_on.is_empty());
        assert_eq!(stored.name, "a");
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn toggle_flips_trigger() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(&f.user, shell_request("toggled", "true"))
            .await
            .unwrap();

        let off = f.orchestrator.toggle(&f.user, job.id).await.unwrap();
        assert!(!off.enabled);
        assert!(!f.orchestrator.is_scheduled(job.id).await);

        let on = f.orchestrator.toggle(&f.user, job.id).await.unwrap();
        assert!(on.enabled);
        assert!(f.orchestrator.is_scheduled(job.id).await);
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn concurrent_lifecycle_calls_match_persisted_state() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(&f.user, shell_request("contended", "true"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..12 {
            let orchestrator = f.orchestrator.clone();
            let user = f.user;
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    orchestrator.toggle(&user, job.id).await.map(|_| ())
                } else {
                    orchestrator
                        .update(
                            &user,
                            job.id,
                            JobUpdateRequest {
                                schedule: Some(format!("{i} 3 * * *")),
                                ..Default::default()
                            },
                        )
                        .await
                        .map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = f.orchestrator.get(&f.user, job.id).await.unwrap();
        assert_eq!(f.orchestrator.is_scheduled(job.id).await, stored.enabled);
        assert_eq!(
            f.orchestrator.registry().scheduled_count(),
            usize::from(stored.enabled)
        );
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn delete_removes_trigger_and_history() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(&f.user, shell_request("doomed", "echo bye"))
            .await
            .unwrap();
        f.orchestrator.run_now(&f.user, job.id).await.unwrap();

        f.orchestrator.delete(&f.user, job.id).await.unwrap();

        assert!(!f.orchestrator.is_scheduled(job.id).await);
        assert!(f.store.list_execution_records(job.id, 10).await.unwrap().is_empty());
        assert!(
            f.orchestrator
                .get(&f.user, job.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn delete_waits_for_in_flight_run() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    enabled: Some(false),
                    ..shell_request("slow", "sleep 0.5")
                },
            )
            .await
            .unwrap();

        let run = {
            let orchestrator = f.orchestrator.clone();
            let user = f.user;
            tokio::spawn(async move { orchestrator.run_now(&user, job.id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        f.orchestrator.delete(&f.user, job.id).await.unwrap();

        assert!(matches!(run.await.unwrap().unwrap(), FireOutcome::Recorded(_)));
        assert!(f.store.list_execution_records(job.id, 10).await.unwrap().is_empty());

        let admin = CallerIdentity::new(Uuid::new_v4(), f.user.organization_id, Role::Admin);
        let stats = f.orchestrator.stats(&admin).await.unwrap();
        assert_eq!(stats.total_jobs, 0);
        assert_eq!(stats.jobs_run_last_24h, 0);
    }

    #[tokio::test]
    async fn delete_with_dependents_is_rejected() {
        let f = fixture().await;
        let upstream = f
            .orchestrator
            .create(&f.user, shell_request("upstream", "true"))
            .await
            .unwrap();
        let downstream = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    depends_on: vec![upstream.id.to_string()],
                    ..shell_request("downstream", "true")
                },
            )
            .await
            .unwrap();

        let err = f.orchestrator.delete(&f.user, upstream.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Dependency(DependencyError::HasDependents { ref ids }) if ids == &vec![downstream.id]
        ));
        assert!(f.orchestrator.is_scheduled(upstream.id).await);
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn other_organizations_see_not_found() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(&f.user, shell_request("private", "true"))
            .await
            .unwrap();
        let outsider = CallerIdentity::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin);

        assert!(f.orchestrator.get(&outsider, job.id).await.unwrap_err().is_not_found());
        assert!(
            f.orchestrator
                .update(&outsider, job.id, JobUpdateRequest::default())
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(f.orchestrator.toggle(&outsider, job.id).await.unwrap_err().is_not_found());
        assert!(f.orchestrator.delete(&outsider, job.id).await.unwrap_err().is_not_found());
        assert!(
            f.orchestrator
                .history(&outsider, job.id, 10)
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(f.orchestrator.run_now(&outsider, job.id).await.unwrap_err().is_not_found());
        assert!(f.orchestrator.list(&outsider).await.unwrap().is_empty());
        assert!(f.orchestrator.is_scheduled(job.id).await);
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn run_now_records_disabled_job() {
        let f = fixture().await;
        let job = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    enabled: Some(false),
                    ..shell_request("manual", "echo manual")
                },
            )
            .await
            .unwrap();

        let outcome = f.orchestrator.run_now(&f.user, job.id).await.unwrap();
        let FireOutcome::Recorded(record) = outcome else {
            panic!("expected a record, got {outcome:?}");
        };
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.output.unwrap()["stdout"], "manual\n");

        let history = f.orchestrator.history(&f.user, job.id, 0).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn stats_require_admin() {
        let f = fixture().await;
        f.orchestrator
            .create(&f.user, shell_request("one", "true"))
            .await
            .unwrap();
        let off = f
            .orchestrator
            .create(
                &f.user,
                JobCreateRequest {
                    enabled: Some(false),
                    ..shell_request("two", "true")
                },
            )
            .await
            .unwrap();
        f.orchestrator.run_now(&f.user, off.id).await.unwrap();

        assert!(matches!(
            f.orchestrator.stats(&f.user).await,
            Err(AppError::PermissionDenied { .. })
        ));

        let admin = CallerIdentity::new(Uuid::new_v4(), f.user.organization_id, Role::Admin);
        let stats = f.orchestrator.stats(&admin).await.unwrap();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.enabled_jobs, 1);
        assert_eq!(stats.disabled_jobs, 1);
        assert_eq!(stats.scheduled_triggers, 1);
        assert_eq!(stats.jobs_run_last_24h, 1);
        f.orchestrator.shutdown();
    }

    #[tokio::test]
    async fn reconcile_installs_enabled_and_skips_unparsable() {
        let f = fixture().await;
        let now = Utc::now();
        let mut stored = Vec::new();
        for (schedule, enabled) in [(NEVER, true), (NEVER, false), ("not a cron", true)] {
            stored.push(
                f.store
                    .create(Job {
                        id: Uuid::new_v4(),
                        owner_id: f.user.user_id,
                        organization_id: f.user.organization_id,
                        name: "persisted".into(),
                        kind: JobKind::Shell(ShellPayload {
                            command: "true".into(),
                        }),
                        schedule: schedule.into(),
                        enabled,
                        retry_limit: 0,
                        webhook_url: None,
                        depends_on: vec![],
                        created_at: now,
                        updated_at: now,
                    })
                    .await
                    .unwrap(),
            );
        }

        let report = f.orchestrator.reconcile().await.unwrap();

        assert_eq!(report.scheduled, 1);
        assert_eq!(report.skipped, vec![stored[2].id]);
        assert!(f.orchestrator.is_scheduled(stored[0].id).await);
        assert!(!f.orchestrator.is_scheduled(stored[1].id).await);
        f.orchestrator.shutdown();
    }
}
