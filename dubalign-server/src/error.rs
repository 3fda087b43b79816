//! Error types for dubalign-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::media_toolkit::ToolkitError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Source material could not be decoded (422)
    #[error("Undecodable source: {0}")]
    Undecodable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<dubalign_core::EngineError> for ApiError {
    fn from(err: dubalign_core::EngineError) -> Self {
        match err {
            dubalign_core::EngineError::Decode(msg) => ApiError::Undecodable(msg),
            dubalign_core::EngineError::InvalidParameters(msg) => ApiError::BadRequest(msg),
            dubalign_core::EngineError::Io(err) => ApiError::Io(err),
        }
    }
}

impl From<ToolkitError> for ApiError {
    fn from(err: ToolkitError) -> Self {
        match err {
            ToolkitError::FileNotFound(path) => {
                ApiError::NotFound(format!("File not found: {}", path.display()))
            }
            ToolkitError::InvalidTrack(msg) => ApiError::BadRequest(msg),
            // The external tool rejecting its input is a request problem
            // (bad container, bad track) far more often than a server one
            ToolkitError::CommandFailed { tool, stderr } => {
                ApiError::BadRequest(format!("{} failed: {}", tool, stderr))
            }
            ToolkitError::UnparseableOutput(msg) => {
                ApiError::Internal(format!("unparseable probe output: {}", msg))
            }
            ToolkitError::Io(err) => ApiError::Io(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Undecodable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNDECODABLE", msg)
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
