//! Live trigger registry
//!
//! Maps job ids to running cron timers. Mutations are serialized per job id:
//! callers take a [`TriggerSlot`] with [`TriggerRegistry::lock`] and hold it
//! across their whole load/persist/swap sequence, so two lifecycle operations
//! on the same job can never both install a timer. Unrelated jobs never
//! contend beyond a brief map lookup.

use chrono::Utc;
use cron::Schedule;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::utils::cron_helper::next_after;

/// Callback invoked on every fire; each call runs in its own task
pub type FireFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A running timer and the expression it was built from
#[derive(Debug)]
struct Trigger {
    cron_expr: String,
    cancel: CancellationToken,
}

type Slot = Arc<Mutex<Option<Trigger>>>;

#[derive(Debug, Default)]
pub struct TriggerRegistry {
    slots: StdMutex<HashMap<Uuid, Slot>>,
    active: AtomicUsize,
    shutdown: CancellationToken,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to one job's trigger
    ///
    /// Waits for any other holder of the same job id. Never hold the slot
    /// across executor I/O.
    pub async fn lock(&self, job_id: Uuid) -> TriggerSlot<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(job_id).or_default().clone()
        };
        TriggerSlot {
            registry: self,
            job_id,
            guard: slot.lock_owned().await,
        }
    }

    /// Install or replace the trigger for `job_id`
    pub async fn install(&self, job_id: Uuid, cron_expr: &str, schedule: Schedule, fire: FireFn) {
        self.lock(job_id).await.install(cron_expr, schedule, fire);
    }

    /// Stop the trigger for `job_id`; returns whether one was active
    pub async fn remove(&self, job_id: Uuid) -> bool {
        self.lock(job_id).await.remove()
    }

    pub async fn is_scheduled(&self, job_id: Uuid) -> bool {
        self.lock(job_id).await.is_active()
    }

    /// Expression of the live trigger, if any
    pub async fn cron_expr(&self, job_id: Uuid) -> Option<String> {
        self.lock(job_id).await.cron_expr().map(str::to_string)
    }

    /// Number of live triggers; zero once the registry is shut down
    pub fn scheduled_count(&self) -> usize {
        if self.shutdown.is_cancelled() {
            return 0;
        }
        self.active.load(Ordering::SeqCst)
    }

    /// Stop every timer; later installs are refused
    pub fn shutdown(&self) {
        info!(
            "Stopping trigger registry ({} live triggers)",
            self.scheduled_count()
        );
        self.shutdown.cancel();
    }

    #[cfg(test)]
    fn tracked_slots(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive handle on one job's trigger, released on drop
pub struct TriggerSlot<'a> {
    registry: &'a TriggerRegistry,
    job_id: Uuid,
    guard: OwnedMutexGuard<Option<Trigger>>,
}

impl TriggerSlot<'_> {
    pub fn is_active(&self) -> bool {
        self.live().is_some()
    }

    pub fn cron_expr(&self) -> Option<&str> {
        self.live().map(|trigger| trigger.cron_expr.as_str())
    }

    fn live(&self) -> Option<&Trigger> {
        self.guard
            .as_ref()
            .filter(|trigger| !trigger.cancel.is_cancelled())
    }

    /// Stop any existing timer, then start a new one
    ///
    /// After [`TriggerRegistry::shutdown`] the existing timer is dropped and
    /// nothing new is started.
    pub fn install(&mut self, cron_expr: &str, schedule: Schedule, fire: FireFn) {
        if self.registry.shutdown.is_cancelled() {
            self.remove();
            debug!(
                "Registry stopped, not installing trigger for job {}",
                self.job_id
            );
            return;
        }

        if let Some(previous) = self.guard.take() {
            previous.cancel.cancel();
            debug!(
                "Replaced trigger for job {} ({} -> {})",
                self.job_id, previous.cron_expr, cron_expr
            );
        } else {
            self.registry.active.fetch_add(1, Ordering::SeqCst);
        }

        let cancel = self.registry.shutdown.child_token();
        spawn_timer(self.job_id, schedule, cancel.clone(), fire);

        *self.guard = Some(Trigger {
            cron_expr: cron_expr.to_string(),
            cancel,
        });
        debug!("Installed trigger for job {} ({})", self.job_id, cron_expr);
    }

    /// Stop the timer if present; returns whether one was active
    pub fn remove(&mut self) -> bool {
        match self.guard.take() {
            Some(trigger) => {
                trigger.cancel.cancel();
                self.registry.active.fetch_sub(1, Ordering::SeqCst);
                debug!("Removed trigger for job {}", self.job_id);
                true
            }
            None => false,
        }
    }
}

impl Drop for TriggerSlot<'_> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }
        // Map entry + our guard; any waiter cloned the Arc under the map lock
        let mut slots = self
            .registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let ours = OwnedMutexGuard::mutex(&self.guard);
        if let Some(slot) = slots.get(&self.job_id) {
            if Arc::ptr_eq(slot, ours) && Arc::strong_count(ours) == 2 {
                slots.remove(&self.job_id);
            }
        }
    }
}

fn spawn_timer(job_id: Uuid, schedule: Schedule, cancel: CancellationToken, fire: FireFn) {
    tokio::spawn(async move {
        let mut cursor = Utc::now();
        loop {
            let Some(next) = next_after(&schedule, cursor) else {
                warn!("Schedule for job {} has no future fire times", job_id);
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            if cancel.is_cancelled() {
                break;
            }

            debug!("Trigger fired for job {} (scheduled {})", job_id, next);
            tokio::spawn(fire());
            // Fires missed while the process was suspended are skipped
            cursor = next.max(Utc::now());
        }
        debug!("Timer for job {} stopped", job_id);
    });
}
