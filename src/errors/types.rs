//! Error type definitions for the cron orchestrator

use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Dependency set rejected
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    /// Resource not found errors, also used for resources owned by another organization
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Permission denied errors
    #[error("Permission denied: {action} on {resource}")]
    PermissionDenied { action: String, resource: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A stored row could not be mapped back into a domain value
    #[error("Corrupt record: {table} {id} - {message}")]
    CorruptRecord {
        table: String,
        id: String,
        message: String,
    },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

/// Rejections raised while validating a job's dependency set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("malformed dependency ids: {}", .ids.join(", "))]
    Malformed { ids: Vec<String> },

    #[error("dependency jobs not found: {}", join_ids(.ids))]
    Missing { ids: Vec<Uuid> },

    #[error("a job cannot depend on itself")]
    SelfReference,

    #[error("dependency cycle detected: {}", join_path(.path))]
    Cycle { path: Vec<Uuid> },

    /// Raised when deleting a job other jobs still depend on
    #[error("job is still required by: {}", join_ids(.ids))]
    HasDependents { ids: Vec<Uuid> },
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_path(path: &[Uuid]) -> String {
    path.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A single failed attempt inside the retry loop
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Remote answered with a non-success status
    #[error("HTTP {status}")]
    HttpStatus { status: u16, body: Value },

    /// Request could not be built, sent or read
    #[error("HTTP request failed: {message}")]
    Request { message: String },

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Shell process could not be started
    #[error("failed to spawn command: {message}")]
    Spawn { message: String },

    #[error("command exited with status {code:?}")]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl ExecutionError {
    /// Normalized error body persisted on failure records
    pub fn to_error_payload(&self) -> Value {
        match self {
            Self::HttpStatus { status, body } => json!({
                "kind": "http_status",
                "status": status,
                "body": body,
            }),
            Self::Request { message } => json!({
                "kind": "request",
                "message": message,
            }),
            Self::Timeout { seconds } => json!({
                "kind": "timeout",
                "message": self.to_string(),
                "seconds": seconds,
            }),
            Self::Spawn { message } => json!({
                "kind": "spawn",
                "message": message,
            }),
            Self::NonZeroExit {
                code,
                stdout,
                stderr,
            } => json!({
                "kind": "exit_status",
                "code": code,
                "stdout": stdout,
                "stderr": stderr,
            }),
        }
    }
}

/// Webhook delivery failure. Logged by the pipeline, never propagated.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("webhook request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("webhook {url} answered with status {status}")]
    Rejected { url: String, status: u16 },
}

impl AppError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>, I: ToString>(resource: S, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn permission_denied<A: Into<String>, R: Into<String>>(action: A, resource: R) -> Self {
        Self::PermissionDenied {
            action: action.into(),
            resource: resource.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is the uniform "not found" result
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
