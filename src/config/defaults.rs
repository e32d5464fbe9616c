/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./cron-orchestrator.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Scheduler defaults
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SHELL: &str = "sh";
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 0;
pub const DEFAULT_HISTORY_LIMIT: u64 = 50;
pub const MAX_HISTORY_LIMIT: u64 = 500;

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Environment
pub const ENV_PREFIX: &str = "CRON_ORCHESTRATOR_";
