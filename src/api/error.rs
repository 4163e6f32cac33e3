//! HTTP error taxonomy and response mapping.
//!
//! Sandbox and validator failures always abort the request fully. The
//! resolved path behind an `AccessDenied` never reaches the client; it is
//! logged where the denial happened. Unexpected errors surface as a generic
//! 500 whose raw detail goes only into the operator-facing `details` field
//! and the server log.

use crate::files::FsError;
use crate::sandbox::SandboxError;
use crate::session::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// Request-level failure.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("access denied")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("already exists")]
    Conflict,

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid session")]
    SessionInvalid(#[source] AuthError),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::AccessDenied => ApiError::AccessDenied,
        }
    }
}

impl From<FsError> for ApiError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound => ApiError::NotFound,
            FsError::NotADirectory => ApiError::NotADirectory,
            FsError::Conflict => ApiError::Conflict,
            FsError::PermissionDenied => ApiError::PermissionDenied,
            FsError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            FsError::Io(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::SessionInvalid(e)
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            ApiError::AccessDenied => (StatusCode::FORBIDDEN, "Access denied".to_string(), None),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string(), None),
            ApiError::NotADirectory => (
                StatusCode::BAD_REQUEST,
                "Not a directory".to_string(),
                None,
            ),
            ApiError::Conflict => (StatusCode::CONFLICT, "Already exists".to_string(), None),
            ApiError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "Permission denied".to_string(),
                None,
            ),
            ApiError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, format!("Invalid input: {msg}"), None)
            }
            ApiError::SessionInvalid(kind) => {
                // The sub-kind stays in the server log; clients see one 401.
                debug!("Session rejected: {}", kind);
                (StatusCode::UNAUTHORIZED, "Invalid session".to_string(), None)
            }
            ApiError::Internal(e) => {
                error!("Unhandled error serving request: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(format!("{e:#}")),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: [(ApiError, StatusCode); 7] = [
            (ApiError::AccessDenied, StatusCode::FORBIDDEN),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::NotADirectory, StatusCode::BAD_REQUEST),
            (ApiError::Conflict, StatusCode::CONFLICT),
            (ApiError::PermissionDenied, StatusCode::FORBIDDEN),
            (
                ApiError::InvalidInput("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::SessionInvalid(AuthError::InactivityTimeout),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_access_denied_body_carries_no_path() {
        let err: ApiError = SandboxError::AccessDenied.into();
        assert_eq!(err.to_string(), "access denied");
    }
}
