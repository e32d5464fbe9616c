//! Health check handler

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;

use crate::web::{
    AppState,
    responses::{ApiResponse, HealthResponse},
};

/// Database connectivity, uptime and live trigger count
///
/// Answers 503 when the database is unreachable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, database) = match state.database.health_check().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            warn!("Health check database probe failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "disconnected")
        }
    };

    let response = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" }.to_string(),
        database: database.to_string(),
        uptime_seconds: (chrono::Utc::now() - state.start_time).num_seconds(),
        scheduled_triggers: state.orchestrator.registry().scheduled_count(),
        running_jobs: state.orchestrator.running_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status, Json(ApiResponse::success(response)))
}
