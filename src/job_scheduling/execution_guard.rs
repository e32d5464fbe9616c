//! Overlap prevention for pipeline invocations
//!
//! A fire for a job that is still running (including its retries) is
//! skipped rather than queued. Deletion waits for the in-flight run instead.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// Tracks which jobs currently have a pipeline invocation in flight
#[derive(Debug, Default, Clone)]
pub struct ExecutionGuard {
    running: Arc<Mutex<HashSet<Uuid>>>,
    released: Arc<Notify>,
}

/// Marks a job as running until dropped
#[derive(Debug)]
pub struct RunningPermit {
    job_id: Uuid,
    running: Arc<Mutex<HashSet<Uuid>>>,
    released: Arc<Notify>,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn running(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the job, or `None` when an invocation is already in flight
    pub fn try_acquire(&self, job_id: Uuid) -> Option<RunningPermit> {
        if !self.running().insert(job_id) {
            debug!("Job {} is already running", job_id);
            return None;
        }
        Some(RunningPermit {
            job_id,
            running: self.running.clone(),
            released: self.released.clone(),
        })
    }

    /// Claim the job, waiting for an in-flight invocation to finish first
    pub async fn acquire(&self, job_id: Uuid) -> RunningPermit {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            // Register before checking so a release in between is not missed
            released.as_mut().enable();
            if let Some(permit) = self.try_acquire(job_id) {
                return permit;
            }
            released.await;
        }
    }

    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.running().contains(&job_id)
    }

    pub fn running_count(&self) -> usize {
        self.running().len()
    }
}

impl RunningPermit {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for RunningPermit {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
        self.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_permit_dropped() {
        let guard = ExecutionGuard::new();
        let job_id = Uuid::new_v4();

        let permit = guard.try_acquire(job_id).expect("first acquire");
        assert_eq!(permit.job_id(), job_id);
        assert!(guard.try_acquire(job_id).is_none());
        assert!(guard.is_running(job_id));

        drop(permit);
        assert!(!guard.is_running(job_id));
        assert!(guard.try_acquire(job_id).is_some());
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let guard = ExecutionGuard::new();
        let job_id = Uuid::new_v4();
        let permit = guard.try_acquire(job_id).unwrap();

        let waiter = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.acquire(job_id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        let claimed = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter woken")
            .unwrap();
        assert_eq!(claimed.job_id(), job_id);
        assert!(guard.try_acquire(job_id).is_none());
    }

    #[test]
    fn different_jobs_do_not_block_each_other() {
        let guard = ExecutionGuard::new();
        let _a = guard.try_acquire(Uuid::new_v4()).unwrap();
        let _b = guard.try_acquire(Uuid::new_v4()).unwrap();
        assert_eq!(guard.running_count(), 2);
    }
}
