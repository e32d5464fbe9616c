//! Request extractors
//!
//! The caller identity is established upstream; this service only reads the
//! trusted headers the identity provider forwards.

use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use super::responses::{ApiResponse, unauthorized};
use crate::config::defaults::DEFAULT_HISTORY_LIMIT;
use crate::models::{CallerIdentity, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ORG_ID_HEADER: &str = "x-org-id";
pub const ROLE_HEADER: &str = "x-user-role";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, String> {
    let raw = header_str(headers, name).ok_or_else(|| format!("Missing {name} header"))?;
    Uuid::parse_str(raw).map_err(|_| format!("Invalid {name} header"))
}

/// Parse the identity headers; a missing role means a regular user
pub fn identity_from_headers(headers: &HeaderMap) -> Result<CallerIdentity, String> {
    let user_id = uuid_header(headers, USER_ID_HEADER)?;
    let organization_id = uuid_header(headers, ORG_ID_HEADER)?;
    let role = match header_str(headers, ROLE_HEADER) {
        Some(raw) => Role::from_str(raw).map_err(|_| format!("Invalid {ROLE_HEADER} header"))?,
        None => Role::User,
    };
    Ok(CallerIdentity::new(user_id, organization_id, role))
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers).map_err(|message| unauthorized(&message))
    }
}

/// `?limit=` for execution history
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: u64,
}

fn default_history_limit() -> u64 {
    DEFAULT_HISTORY_LIMIT
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

impl<S> FromRequestParts<S> for HistoryParams
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HistoryParams>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    axum::Json(ApiResponse::error(
                        "limit must be a non-negative integer".to_string(),
                    )),
                )
                    .into_response()
            })?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn parses_identity_with_default_role() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let identity = identity_from_headers(&headers(&[
            (USER_ID_HEADER, &user.to_string()),
            (ORG_ID_HEADER, &org.to_string()),
        ]))
        .unwrap();

        assert_eq!(identity, CallerIdentity::new(user, org, Role::User));
    }

    #[test]
    fn role_is_case_insensitive() {
        let identity = identity_from_headers(&headers(&[
            (USER_ID_HEADER, &Uuid::new_v4().to_string()),
            (ORG_ID_HEADER, &Uuid::new_v4().to_string()),
            (ROLE_HEADER, "Admin"),
        ]))
        .unwrap();
        assert!(identity.is_admin());
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        assert!(identity_from_headers(&HeaderMap::new()).is_err());
        assert!(
            identity_from_headers(&headers(&[
                (USER_ID_HEADER, "not-a-uuid"),
                (ORG_ID_HEADER, &Uuid::new_v4().to_string()),
            ]))
            .is_err()
        );
        assert!(
            identity_from_headers(&headers(&[
                (USER_ID_HEADER, &Uuid::new_v4().to_string()),
                (ORG_ID_HEADER, &Uuid::new_v4().to_string()),
                (ROLE_HEADER, "root"),
            ]))
            .is_err()
        );
    }
}
