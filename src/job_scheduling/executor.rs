//! Kind-specific executors
//!
//! [`HttpExecutor`] and [`ShellExecutor`] are the seams to the outside world;
//! [`JobExecutor`] dispatches a [`JobKind`] to the right one and normalizes
//! the outcome into the JSON stored on execution records.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::errors::{AppResult, ExecutionError};
use crate::models::{HttpPayload, JobKind, ShellPayload};
use crate::utils::create_http_client;

/// Normalized response of a successful HTTP call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpOutcome {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// Captured streams of a successful shell command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Perform one attempt; a non-2xx answer is an [`ExecutionError::HttpStatus`]
    async fn execute(&self, payload: &HttpPayload) -> Result<HttpOutcome, ExecutionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Run one attempt; non-zero exit and spawn failures are errors
    async fn execute(&self, payload: &ShellPayload) -> Result<ShellOutcome, ExecutionError>;
}

/// reqwest-backed HTTP executor
#[derive(Clone)]
pub struct ReqwestHttpExecutor {
    client: Client,
    timeout: Duration,
}

impl ReqwestHttpExecutor {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            client: create_http_client(timeout)?,
            timeout,
        })
    }

    fn map_error(&self, error: reqwest::Error) -> ExecutionError {
        if error.is_timeout() {
            ExecutionError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            ExecutionError::Request {
                message: error.to_string(),
            }
        }
    }
}

fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl HttpExecutor for ReqwestHttpExecutor {
    async fn execute(&self, payload: &HttpPayload) -> Result<HttpOutcome, ExecutionError> {
        let method =
            Method::from_bytes(payload.method.as_bytes()).map_err(|e| ExecutionError::Request {
                message: format!("invalid method '{}': {e}", payload.method),
            })?;
        let sends_body = method == Method::POST || method == Method::PUT || method == Method::PATCH;

        let mut request = self.client.request(method.clone(), &payload.url);
        for (name, value) in &payload.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if sends_body {
            if let Some(body) = &payload.body {
                request = request.json(body);
            }
        }

        debug!("{} {}", method, payload.url);
        let response = request.send().await.map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(|e| self.map_error(e))?;
        let body = parse_body(&text);

        if !status.is_success() {
            return Err(ExecutionError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(HttpOutcome {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// tokio::process-backed shell executor running `<shell> -c <command>`
#[derive(Debug, Clone)]
pub struct ProcessShellExecutor {
    shell: String,
    timeout: Duration,
}

impl ProcessShellExecutor {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ShellExecutor for ProcessShellExecutor {
    async fn execute(&self, payload: &ShellPayload) -> Result<ShellOutcome, ExecutionError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&payload.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| ExecutionError::Spawn {
            message: format!("{}: {e}", self.shell),
        })?;

        // Dropping the future on timeout kills the child
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecutionError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ExecutionError::Spawn {
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ExecutionError::NonZeroExit {
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        if !stderr.trim().is_empty() {
            warn!(
                "Command '{}' succeeded with stderr output: {}",
                payload.command,
                stderr.trim()
            );
        }

        Ok(ShellOutcome {
            stdout,
            stderr,
            exit_code: output.status.code().unwrap_or_default(),
        })
    }
}

/// Exhaustive dispatch from job kind to executor
#[derive(Clone)]
pub struct JobExecutor {
    http: Arc<dyn HttpExecutor>,
    shell: Arc<dyn ShellExecutor>,
}

impl JobExecutor {
    pub fn new(http: Arc<dyn HttpExecutor>, shell: Arc<dyn ShellExecutor>) -> Self {
        Self { http, shell }
    }

    /// Executors configured from the scheduler settings
    pub fn from_config(config: &SchedulerConfig) -> AppResult<Self> {
        Ok(Self::new(
            Arc::new(ReqwestHttpExecutor::new(config.http_timeout)?),
            Arc::new(ProcessShellExecutor::new(
                config.shell.clone(),
                config.shell_timeout,
            )),
        ))
    }

    /// Run one attempt and return the output payload for the record
    pub async fn execute(&self, kind: &JobKind) -> Result<Value, ExecutionError> {
        match kind {
            JobKind::Http(payload) => {
                let outcome = self.http.execute(payload).await?;
                Ok(json!({
                    "status": outcome.status,
                    "headers": outcome.headers,
                    "body": outcome.body,
                }))
            }
            JobKind::Shell(payload) => {
                let outcome = self.shell.execute(payload).await?;
                Ok(json!({
                    "stdout": outcome.stdout,
                    "stderr": outcome.stderr,
                    "exit_code": outcome.exit_code,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    fn shell(command: &str) -> ShellPayload {
        ShellPayload {
            command: command.to_string(),
        }
    }

    #[tokio::test]
    async fn shell_captures_stdout() {
        let executor = ProcessShellExecutor::new("sh", Duration::from_secs(5));
        let outcome = executor.execute(&shell("echo hello")).await.unwrap();
        assert_eq!(outcome.stdout.trim(), "hello");
        assert_eq!(outcome.exit_code, 0);
    }

    #[tokio::test]
    async fn shell_stderr_with_zero_exit_is_success() {
        let executor = ProcessShellExecutor::new("sh", Duration::from_secs(5));
        let outcome = executor
            .execute(&shell("echo careful >&2; echo done"))
            .await
            .unwrap();
        assert_eq!(outcome.stderr.trim(), "careful");
        assert_eq!(outcome.stdout.trim(), "done");
    }

    #[tokio::test]
    async fn shell_non_zero_exit_is_failure() {
        let executor = ProcessShellExecutor::new("sh", Duration::from_secs(5));
        let err = executor
            .execute(&shell("echo nope >&2; exit 3"))
            .await
            .unwrap_err();
        match err {
            ExecutionError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "nope");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn shell_timeout_and_spawn_failures() {
        let executor = ProcessShellExecutor::new("sh", Duration::from_millis(200));
        assert!(matches!(
            executor.execute(&shell("sleep 5")).await,
            Err(ExecutionError::Timeout { .. })
        ));

        let missing = ProcessShellExecutor::new("/nonexistent/shell", Duration::from_secs(1));
        assert!(matches!(
            missing.execute(&shell("true")).await,
            Err(ExecutionError::Spawn { .. })
        ));
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn http_sends_json_body_and_normalizes_response() {
        let base = spawn_server(Router::new().route(
            "/echo",
            post(|Json(body): Json<Value>| async move { Json(json!({"received": body})) }),
        ))
        .await;

        let executor = ReqwestHttpExecutor::new(Duration::from_secs(5)).unwrap();
        let outcome = executor
            .execute(&HttpPayload {
                url: format!("{base}/echo"),
                method: "POST".into(),
                headers: BTreeMap::new(),
                body: Some(json!({"n": 1})),
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.body, json!({"received": {"n": 1}}));
        assert!(outcome.headers.contains_key("content-type"));
    }

    #[tokio::test]
    async fn http_error_status_carries_body() {
        let base = spawn_server(Router::new().route(
            "/fail",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "down"}))) }),
        ))
        .await;

        let executor = ReqwestHttpExecutor::new(Duration::from_secs(5)).unwrap();
        let err = executor
            .execute(&HttpPayload {
                url: format!("{base}/fail"),
                method: "POST".into(),
                headers: BTreeMap::new(),
                body: None,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ExecutionError::HttpStatus {
                status: 503,
                body: json!({"error": "down"}),
            }
        );
    }

    #[tokio::test]
    async fn dispatches_by_kind() {
        let mut http = MockHttpExecutor::new();
        http.expect_execute().never();
        let mut shell_mock = MockShellExecutor::new();
        shell_mock.expect_execute().times(1).returning(|payload| {
            Ok(ShellOutcome {
                stdout: format!("ran {}", payload.command),
                stderr: String::new(),
                exit_code: 0,
            })
        });

        let executor = JobExecutor::new(Arc::new(http), Arc::new(shell_mock));
        let output = executor
            .execute(&JobKind::Shell(shell("backup")))
            .await
            .unwrap();
        assert_eq!(output["stdout"], "ran backup");
        assert_eq!(output["exit_code"], 0);
    }

    #[test]
    fn body_parsing_falls_back_to_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("plain"), json!("plain"));
    }
}
