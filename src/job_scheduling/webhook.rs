//! Best-effort webhook notification
//!
//! Delivery is attempted once. The outcome is reported as a
//! [`NotificationOutcome`] value rather than an error so callers cannot
//! accidentally propagate it with `?`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{AppResult, NotificationError};
use crate::models::{ExecutionRecord, ExecutionStatus};
use crate::utils::create_http_client;

/// Body POSTed to a job's webhook after every recorded invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub job_id: Uuid,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub executed_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl From<&ExecutionRecord> for WebhookPayload {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            job_id: record.job_id,
            status: record.status,
            output: record.output.clone(),
            error: record.error.clone(),
            executed_at: record.executed_at,
            retry_count: record.retry_count,
        }
    }
}

#[derive(Debug)]
pub enum NotificationOutcome {
    Delivered,
    Failed(NotificationError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn notify(&self, url: &str, payload: &WebhookPayload) -> NotificationOutcome;
}

/// reqwest-backed notifier
#[derive(Clone)]
pub struct HttpWebhookNotifier {
    client: Client,
}

impl HttpWebhookNotifier {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: create_http_client(timeout)?,
        })
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    async fn notify(&self, url: &str, payload: &WebhookPayload) -> NotificationOutcome {
        let response = match self.client.post(url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                return NotificationOutcome::Failed(NotificationError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            return NotificationOutcome::Failed(NotificationError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!("Delivered webhook for job {} to {}", payload.job_id, url);
        NotificationOutcome::Delivered
    }
}
