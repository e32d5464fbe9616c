use std::time::Duration;

use reqwest::Client;

use crate::errors::{AppError, AppResult};

const USER_AGENT: &str = concat!("cron-orchestrator/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a reqwest client with a total request timeout
///
/// The connect timeout is capped at the request timeout so a short job
/// timeout is never outlived by the connection phase.
pub fn create_http_client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_for_short_timeouts() {
        assert!(create_http_client(Duration::from_millis(250)).is_ok());
        assert!(create_http_client(Duration::from_secs(30)).is_ok());
    }
}
