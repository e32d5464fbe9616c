//! Job definitions and the request types that create or modify them

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Discriminator for the kind of work a job performs
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobType {
    Http,
    Shell,
}

/// Outbound HTTP call performed on every fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpPayload {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Shell command line run through the configured shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellPayload {
    pub command: String,
}

/// Kind-specific work, tagged so that the payload always matches the kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum JobKind {
    Http(HttpPayload),
    Shell(ShellPayload),
}

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

impl JobKind {
    /// Build a kind from the loose `type` + `payload` pair sent by clients
    pub fn from_parts(job_type: &str, payload: Value) -> AppResult<Self> {
        let job_type = JobType::from_str(job_type.trim()).map_err(|_| {
            AppError::validation(format!(
                "Invalid job type '{job_type}', expected 'http' or 'shell'"
            ))
        })?;

        match job_type {
            JobType::Http => {
                let has_url = payload.get("url").and_then(Value::as_str).is_some();
                let has_method = payload.get("method").and_then(Value::as_str).is_some();
                if !has_url || !has_method {
                    return Err(AppError::validation(
                        "HTTP jobs require url and method in payload",
                    ));
                }
                let mut http: HttpPayload = serde_json::from_value(payload)
                    .map_err(|e| AppError::validation(format!("Invalid HTTP payload: {e}")))?;
                http.method = http.method.trim().to_ascii_uppercase();
                Self::Http(http).validated()
            }
            JobType::Shell => {
                let shell: ShellPayload = serde_json::from_value(payload).map_err(|_| {
                    AppError::validation("Shell jobs require command in payload")
                })?;
                Self::Shell(shell).validated()
            }
        }
    }

    fn validated(self) -> AppResult<Self> {
        match &self {
            Self::Http(http) => {
                let parsed = url::Url::parse(&http.url)
                    .map_err(|e| AppError::validation(format!("Invalid URL '{}': {e}", http.url)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::validation(format!(
                        "Unsupported URL scheme '{}'",
                        parsed.scheme()
                    )));
                }
                if !HTTP_METHODS.contains(&http.method.as_str()) {
                    return Err(AppError::validation(format!(
                        "Unsupported HTTP method '{}'",
                        http.method
                    )));
                }
            }
            Self::Shell(shell) => {
                if shell.command.trim().is_empty() {
                    return Err(AppError::validation("Shell jobs require command in payload"));
                }
            }
        }
        Ok(self)
    }

    pub fn job_type(&self) -> JobType {
        match self {
            Self::Http(_) => JobType::Http,
            Self::Shell(_) => JobType::Shell,
        }
    }

    /// Payload without the discriminator, as stored and returned to clients
    pub fn payload_json(&self) -> Value {
        let payload = match self {
            Self::Http(http) => serde_json::to_value(http),
            Self::Shell(shell) => serde_json::to_value(shell),
        };
        payload.unwrap_or(Value::Null)
    }
}

/// A recurring task owned by an organization
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub kind: JobKind,
    /// Cron expression as supplied (5, 6 or 7 fields)
    pub schedule: String,
    pub enabled: bool,
    pub retry_limit: u32,
    pub webhook_url: Option<String>,
    /// Ordered, duplicate-free ids of jobs that must have succeeded last
    pub depends_on: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter used when listing jobs from the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub organization_id: Option<Uuid>,
    pub enabled: Option<bool>,
}

impl JobFilter {
    pub fn organization(organization_id: Uuid) -> Self {
        Self {
            organization_id: Some(organization_id),
            enabled: None,
        }
    }

    pub fn enabled() -> Self {
        Self {
            organization_id: None,
            enabled: Some(true),
        }
    }
}

/// Request payload for creating a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub schedule: String,
    pub payload: Value,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub retry_limit: Option<i64>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Partial update; only present fields are applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub job_type: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub retry_limit: Option<i64>,
    /// An empty string clears the webhook
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub depends_on: Option<Vec<String>>,
}

/// Check a job name and return it trimmed
pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Job name is required"));
    }
    if name.len() > 255 {
        return Err(AppError::validation(
            "Job name must be at most 255 characters",
        ));
    }
    Ok(name.to_string())
}

pub fn validate_retry_limit(retry_limit: i64) -> AppResult<u32> {
    u32::try_from(retry_limit)
        .ok()
        .filter(|limit| *limit <= 100)
        .ok_or_else(|| AppError::validation("retry_limit must be between 0 and 100"))
}

/// Normalize an optional webhook URL; blank means "no webhook"
pub fn validate_webhook_url(webhook_url: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = webhook_url.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let parsed = url::Url::parse(raw)
        .map_err(|e| AppError::validation(format!("Invalid webhook URL '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::validation("Webhook URL must use http or https"));
    }
    Ok(Some(raw.to_string()))
}
