//! Dependency validation, cycle detection and fire-time readiness
//!
//! The dependency relation is a directed graph with an edge from a job to
//! each job it depends on. It must stay acyclic: every create or update that
//! touches dependencies runs [`DependencyValidator::validate`] and
//! [`DependencyValidator::detect_cycle`] before anything is persisted.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppResult, DependencyError};
use crate::models::Job;
use crate::repositories::JobStore;

/// Whether a job may run on this fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Blocked {
        dependency: Uuid,
        reason: BlockReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    NeverExecuted,
    LastRunFailed { at: DateTime<Utc> },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverExecuted => write!(f, "dependency has never executed"),
            Self::LastRunFailed { at } => write!(f, "dependency last failed at {at}"),
        }
    }
}

#[derive(Clone)]
pub struct DependencyValidator {
    store: Arc<dyn JobStore>,
}

impl DependencyValidator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Parse, deduplicate and existence-check a candidate dependency list
    ///
    /// Order of first appearance is preserved. Ids that exist only in
    /// another organization are reported as missing.
    pub async fn validate(&self, candidate: &[String], organization_id: Uuid) -> AppResult<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(candidate.len());
        let mut malformed = Vec::new();
        for raw in candidate {
            match Uuid::parse_str(raw.trim()) {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(_) => malformed.push(raw.clone()),
            }
        }
        if !malformed.is_empty() {
            return Err(DependencyError::Malformed { ids: malformed }.into());
        }

        let found: HashSet<Uuid> = self
            .store
            .find_by_ids(&ids, organization_id)
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect();
        let missing: Vec<Uuid> = ids.iter().copied().filter(|id| !found.contains(id)).collect();
        if !missing.is_empty() {
            return Err(DependencyError::Missing { ids: missing }.into());
        }

        Ok(ids)
    }

    /// Reject `proposed` if giving it to `job_id` would close a cycle
    ///
    /// `job_id`'s edges are taken from `proposed`; every other job's edges
    /// come from the store. A node is a cycle witness only while it is on
    /// the current path; nodes whose subtrees were fully explored are
    /// skipped on later visits since no cycle runs through them.
    pub async fn detect_cycle(
        &self,
        job_id: Uuid,
        proposed: &[Uuid],
        organization_id: Uuid,
    ) -> AppResult<()> {
        if proposed.contains(&job_id) {
            return Err(DependencyError::SelfReference.into());
        }

        let mut edges: HashMap<Uuid, Vec<Uuid>> = HashMap::from([(job_id, proposed.to_vec())]);
        let mut on_path: HashSet<Uuid> = HashSet::from([job_id]);
        let mut finished: HashSet<Uuid> = HashSet::new();
        // (node, index of the next edge to follow)
        let mut stack: Vec<(Uuid, usize)> = vec![(job_id, 0)];

        while let Some(&(node, next_edge)) = stack.last() {
            if !edges.contains_key(&node) {
                let persisted = self.persisted_edges(node, organization_id).await?;
                edges.insert(node, persisted);
            }
            let child = edges.get(&node).and_then(|e| e.get(next_edge)).copied();

            let Some(child) = child else {
                stack.pop();
                on_path.remove(&node);
                finished.insert(node);
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            if on_path.contains(&child) {
                let mut path: Vec<Uuid> = stack
                    .iter()
                    .map(|(id, _)| *id)
                    .skip_while(|id| *id != child)
                    .collect();
                path.push(child);
                debug!("Dependency cycle for job {}: {:?}", job_id, path);
                return Err(DependencyError::Cycle { path }.into());
            }
            if finished.contains(&child) {
                continue;
            }

            on_path.insert(child);
            stack.push((child, 0));
        }

        Ok(())
    }

    async fn persisted_edges(&self, job_id: Uuid, organization_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .store
            .find_one(job_id, organization_id)
            .await?
            .map(|job| job.depends_on)
            .unwrap_or_default())
    }

    /// Check every dependency's most recent outcome
    ///
    /// The first dependency without a successful latest record blocks the
    /// fire. Reads are a snapshot; a concurrent write may or may not be seen.
    pub async fn check_readiness(&self, job: &Job) -> AppResult<Readiness> {
        for dependency in &job.depends_on {
            let latest = self.store.find_latest_execution_record(*dependency).await?;
            let reason = match latest {
                None => BlockReason::NeverExecuted,
                Some(record) if !record.is_success() => BlockReason::LastRunFailed {
                    at: record.executed_at,
                },
                Some(_) => continue,
            };
            return Ok(Readiness::Blocked {
                dependency: *dependency,
                reason,
            });
        }
        Ok(Readiness::Ready)
    }
}
