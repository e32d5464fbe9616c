//! Scheduling and execution core
//!
//! Durable jobs live in the [`JobStore`](crate::repositories::JobStore); the
//! [`TriggerRegistry`] is a process-local cache of live timers derived from
//! them and rebuilt by [`JobOrchestrator::reconcile`] on startup.
//!
//! ```text
//! lifecycle op -> JobOrchestrator -> JobStore (persist)
//!                                 -> TriggerRegistry (install / remove)
//! timer fire   -> ExecutionPipeline -> ExecutionGuard (overlap)
//!                                   -> DependencyValidator (readiness)
//!                                   -> JobExecutor (http | shell, retried)
//!                                   -> JobStore (one ExecutionRecord)
//!                                   -> WebhookNotifier (best effort)
//! ```

pub mod dependency;
pub mod execution_guard;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod trigger_registry;
pub mod webhook;

pub use dependency::{BlockReason, DependencyValidator, Readiness};
pub use execution_guard::{ExecutionGuard, RunningPermit};
pub use executor::{
    HttpExecutor, HttpOutcome, JobExecutor, ProcessShellExecutor, ReqwestHttpExecutor,
    ShellExecutor, ShellOutcome,
};
pub use orchestrator::{JobOrchestrator, ReconcileReport};
pub use pipeline::{ExecutionPipeline, FireOutcome, SkipReason};
pub use trigger_registry::{FireFn, TriggerRegistry, TriggerSlot};
pub use webhook::{HttpWebhookNotifier, NotificationOutcome, WebhookNotifier, WebhookPayload};
