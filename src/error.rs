//! Error types for HabitCoach.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            Error::NotFound(msg) | Error::Validation(msg) => msg.clone(),
            other => {
                tracing::error!(error = %other, "Request failed");
                other.to_string()
            }
        };

        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::NotFound("User not found".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Validation("title is required".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Upstream("timeout".into()).status_and_code().0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::Persistence("disk full".into()).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
