//! Layered service configuration
//!
//! Values are resolved in this order, later layers winning:
//! built-in defaults, the TOML file, `CRON_ORCHESTRATOR_*` environment
//! variables (`__` separates nested keys, e.g.
//! `CRON_ORCHESTRATOR_WEB__PORT=9000`), then command line overrides applied
//! by the binary.

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Execution pipeline and executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Per-attempt timeout for HTTP jobs
    #[serde(default = "default_http_timeout", with = "duration")]
    pub http_timeout: Duration,
    /// Per-attempt timeout for shell jobs
    #[serde(default = "default_shell_timeout", with = "duration")]
    pub shell_timeout: Duration,
    #[serde(default = "default_webhook_timeout", with = "duration")]
    pub webhook_timeout: Duration,
    /// Shell used to run `<shell> -c <command>`
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Constant delay between failed attempts; zero keeps back-to-back retries
    #[serde(default = "default_retry_backoff", with = "duration")]
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
}

fn default_shell_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SHELL_TIMEOUT_SECS)
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS)
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(DEFAULT_RETRY_BACKOFF_SECS)
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            http_timeout: default_http_timeout(),
            shell_timeout: default_shell_timeout(),
            webhook_timeout: default_webhook_timeout(),
            shell: default_shell(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Load the layered configuration, writing a default file first when absent
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())
                .context("Failed to render default configuration")?;
            std::fs::write(config_file, contents)
                .with_context(|| format!("Failed to write default config file {config_file}"))?;
            info!("Created default config file: {}", config_file);
        }

        Self::figment(config_file)
            .extract()
            .with_context(|| format!("Failed to load configuration from {config_file}"))
    }

    fn figment(config_file: &str) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.web.host, self.web.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let config = Config::load_from_file(path).unwrap();

        assert!(Path::new(path).exists());
        assert_eq!(config.web.port, DEFAULT_PORT);
        assert_eq!(config.scheduler.shell, "sh");
        assert_eq!(config.scheduler.retry_backoff, Duration::ZERO);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[web]
port = 9191

[scheduler]
http_timeout = "5s"
retry_backoff = "250ms"

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();

        assert_eq!(config.web.port, 9191);
        assert_eq!(config.web.host, DEFAULT_HOST);
        assert_eq!(config.scheduler.http_timeout, Duration::from_secs(5));
        assert_eq!(config.scheduler.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[web]\nport = 9191\n").unwrap();

        // SAFETY: serialized with the other environment-sensitive tests
        unsafe { std::env::set_var("CRON_ORCHESTRATOR_WEB__PORT", "7000") };
        let config = Config::load_from_file(path.to_str().unwrap());
        unsafe { std::env::remove_var("CRON_ORCHESTRATOR_WEB__PORT") };

        assert_eq!(config.unwrap().web.port, 7000);
    }
}
