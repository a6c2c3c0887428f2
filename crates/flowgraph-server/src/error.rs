//! Error types for the server: API errors with HTTP status mapping, plus the
//! worker and session failures that end an execution during setup.
//!
//! [`ApiError`] implements `axum::response::IntoResponse` to produce
//! structured JSON error bodies with appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use flowgraph_storage::StorageError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Entity not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": ApiErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

/// Failures of the worker that stores and runs a session's files.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to connect to worker: {0}")]
    Connect(String),

    /// Upload paths must be relative and stay inside the workspace.
    #[error("invalid upload path '{path}'")]
    InvalidPath { path: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process {0} stream was not captured")]
    MissingStream(&'static str),
}

/// Failures that end a session before its process runs.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("sheet not found: {sheet}")]
    SheetNotFound { sheet: String },

    #[error("sheet has no files")]
    NoFiles,

    #[error("unsupported language: {language}")]
    UnsupportedLanguage { language: String },

    #[error("setup timed out after {secs}s")]
    SetupTimeout { secs: u64 },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SheetNotFound { sheet } => SessionError::SheetNotFound { sheet },
            other => SessionError::Storage(other),
        }
    }
}

impl From<flowgraph_core::CoreError> for SessionError {
    fn from(err: flowgraph_core::CoreError) -> Self {
        match err {
            flowgraph_core::CoreError::UnsupportedLanguage { language } => {
                SessionError::UnsupportedLanguage { language }
            }
        }
    }
}
