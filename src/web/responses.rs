//! HTTP response types and error mapping
//!
//! Every endpoint answers with the [`ApiResponse`] envelope. [`handle_error`]
//! is the single place where [`AppError`] variants become status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::error;

use crate::errors::{AppError, DependencyError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error_with_details(message: String, details: HashMap<String, String>) -> Self {
        Self {
            details: Some(details),
            ..Self::error(message)
        }
    }
}

fn join_ids<I: ToString>(ids: &[I]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn dependency_details(error: &DependencyError) -> Option<HashMap<String, String>> {
    let (key, value) = match error {
        DependencyError::Malformed { ids } => ("malformed", join_ids(ids)),
        DependencyError::Missing { ids } => ("missing", join_ids(ids)),
        DependencyError::Cycle { path } => ("path", join_ids(path)),
        DependencyError::HasDependents { ids } => ("dependents", join_ids(ids)),
        DependencyError::SelfReference => return None,
    };
    Some(HashMap::from([(key.to_string(), value)]))
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, message, details) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        AppError::Dependency(dependency) => {
            let status = match dependency {
                DependencyError::Cycle { .. } | DependencyError::HasDependents { .. } => {
                    StatusCode::CONFLICT
                }
                DependencyError::Malformed { .. }
                | DependencyError::Missing { .. }
                | DependencyError::SelfReference => StatusCode::BAD_REQUEST,
            };
            (status, dependency.to_string(), dependency_details(dependency))
        }
        AppError::NotFound { resource, id } => (
            StatusCode::NOT_FOUND,
            format!("{resource} with id '{id}' not found"),
            None,
        ),
        AppError::PermissionDenied { action, resource } => (
            StatusCode::FORBIDDEN,
            format!("Permission denied: {action} on {resource}"),
            None,
        ),
        AppError::Database(_) | AppError::Repository(_) => {
            error!("Data access failed: {}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Data access failed".to_string(),
                None,
            )
        }
        AppError::Configuration { .. } | AppError::Internal { .. } => {
            error!("Request failed: {}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
            )
        }
    };

    let body = match details {
        Some(details) => ApiResponse::error_with_details(message, details),
        None => ApiResponse::error(message),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}

pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::error(message.to_string())),
    )
        .into_response()
}

/// Health check payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: i64,
    pub scheduled_triggers: usize,
    pub running_jobs: usize,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn dependency_errors_map_to_conflict_or_bad_request() {
        let cycle = handle_error(
            DependencyError::Cycle {
                path: vec![Uuid::nil(), Uuid::nil()],
            }
            .into(),
        );
        assert_eq!(cycle.status(), StatusCode::CONFLICT);

        let missing = handle_error(DependencyError::Missing { ids: vec![Uuid::nil()] }.into());
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let dependents = handle_error(DependencyError::HasDependents { ids: vec![] }.into());
        assert_eq!(dependents.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_are_opaque() {
        let response = handle_error(AppError::internal("secret detail"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cycle_details_carry_path() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let details = dependency_details(&DependencyError::Cycle { path: vec![a, b, a] }).unwrap();
        assert_eq!(details["path"], format!("{a},{b},{a}"));
    }
}
