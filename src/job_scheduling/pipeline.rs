//! Execution pipeline
//!
//! One invocation per fire: overlap guard, readiness gate, fixed-count retry
//! loop, exactly one execution record, then a best-effort webhook.
//! Execution failures never leave this module; only store failures do.

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dependency::{BlockReason, DependencyValidator, Readiness};
use super::execution_guard::{ExecutionGuard, RunningPermit};
use super::executor::JobExecutor;
use super::trigger_registry::FireFn;
use super::webhook::{NotificationOutcome, WebhookNotifier, WebhookPayload};
use crate::errors::AppResult;
use crate::models::{ExecutionRecord, Job};
use crate::repositories::JobStore;

/// Why a fire produced no record
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Job was deleted before the pipeline claimed it
    JobMissing,
    /// Job was disabled between the timer firing and the pipeline starting
    JobDisabled,
    DependencyNotReady {
        dependency: Uuid,
        reason: BlockReason,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Recorded(ExecutionRecord),
    Skipped(SkipReason),
    /// A previous invocation for the same job is still in flight
    AlreadyRunning,
}

pub struct ExecutionPipeline {
    store: Arc<dyn JobStore>,
    dependencies: DependencyValidator,
    executor: JobExecutor,
    notifier: Arc<dyn WebhookNotifier>,
    guard: ExecutionGuard,
    retry_backoff: Duration,
}

impl ExecutionPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        dependencies: DependencyValidator,
        executor: JobExecutor,
        notifier: Arc<dyn WebhookNotifier>,
    ) -> Self {
        Self {
            store,
            dependencies,
            executor,
            notifier,
            guard: ExecutionGuard::new(),
            retry_backoff: Duration::ZERO,
        }
    }

    /// Constant delay between failed attempts
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Scheduled entry point: reload the job, then run it if still enabled
    pub async fn fire(&self, job_id: Uuid, organization_id: Uuid) -> AppResult<FireOutcome> {
        let Some(job) = self.store.find_one(job_id, organization_id).await? else {
            warn!("Job {} fired but no longer exists", job_id);
            return Ok(FireOutcome::Skipped(SkipReason::JobMissing));
        };
        if !job.enabled {
            debug!("Job {} fired after being disabled", job_id);
            return Ok(FireOutcome::Skipped(SkipReason::JobDisabled));
        }
        self.run(&job).await
    }

    /// Run one invocation of `job` regardless of its enabled flag
    pub async fn run(&self, job: &Job) -> AppResult<FireOutcome> {
        let Some(_permit) = self.guard.try_acquire(job.id) else {
            warn!(
                "Skipping fire of job {} ({}): previous run still in progress",
                job.id, job.name
            );
            return Ok(FireOutcome::AlreadyRunning);
        };

        // Deletion holds the permit, so a job still present here outlives this run
        if self.store.find_one(job.id, job.organization_id).await?.is_none() {
            warn!("Job {} was deleted before its run started", job.id);
            return Ok(FireOutcome::Skipped(SkipReason::JobMissing));
        }

        if let Readiness::Blocked { dependency, reason } =
            self.dependencies.check_readiness(job).await?
        {
            warn!(
                "Skipping fire of job {} ({}): dependency {} not ready, {}",
                job.id, job.name, dependency, reason
            );
            return Ok(FireOutcome::Skipped(SkipReason::DependencyNotReady {
                dependency,
                reason,
            }));
        }

        let record = self.execute_with_retries(job).await;
        let record = self.store.append_execution_record(record).await?;
        info!(
            "Job {} ({}) finished: {} after {} attempt(s)",
            job.id, job.name, record.status, record.attempts
        );

        if let Some(url) = job.webhook_url.as_deref() {
            self.notify(url, &record).await;
        }

        Ok(FireOutcome::Recorded(record))
    }

    async fn execute_with_retries(&self, job: &Job) -> ExecutionRecord {
        let mut attempt: u32 = 0;
        loop {
            match self.executor.execute(&job.kind).await {
                Ok(output) => {
                    return ExecutionRecord::success(job.id, job.organization_id, attempt, output);
                }
                Err(error) if attempt >= job.retry_limit => {
                    warn!(
                        "Job {} failed on final attempt {}: {}",
                        job.id, attempt, error
                    );
                    return ExecutionRecord::failure(
                        job.id,
                        job.organization_id,
                        attempt,
                        error.to_error_payload(),
                    );
                }
                Err(error) => {
                    debug!(
                        "Job {} attempt {} of {} failed: {}",
                        job.id,
                        attempt,
                        job.retry_limit,
                        error
                    );
                    if !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn notify(&self, url: &str, record: &ExecutionRecord) {
        match self.notifier.notify(url, &WebhookPayload::from(record)).await {
            NotificationOutcome::Delivered => {}
            NotificationOutcome::Failed(error) => {
                warn!("Webhook for job {} not delivered: {}", record.job_id, error);
            }
        }
    }

    /// Timer callback that fires this job through the pipeline
    pub fn fire_fn(self: &Arc<Self>, job_id: Uuid, organization_id: Uuid) -> FireFn {
        let pipeline = Arc::clone(self);
        Arc::new(move || {
            let pipeline = pipeline.clone();
            async move {
                if let Err(e) = pipeline.fire(job_id, organization_id).await {
                    error!("Scheduled run of job {} failed: {}", job_id, e);
                }
            }
            .boxed()
        })
    }

    pub fn running_count(&self) -> usize {
        self.guard.running_count()
    }

    /// Wait out any in-flight run of `job_id` and hold off new ones while the permit lives
    pub async fn claim(&self, job_id: Uuid) -> RunningPermit {
        self.guard.acquire(job_id).await
    }
}
