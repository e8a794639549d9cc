//! Error types and HTTP error response handling.
//!
//! `AppError` covers everything the HTTP layer can fail with and knows how to
//! turn itself into a JSON response. `PipelineError` covers the offline
//! processing commands (`process-video`, `merge-clips`), which never speak
//! HTTP as a server and simply propagate failures to `main`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// A single field that failed request validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Application-wide error type for the HTTP API.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Input Errors**: Empty bodies, malformed JSON, failed validation
/// - **Resource Errors**: Requested violation or profile not found
/// - **Authentication Errors**: Bad ingest signature
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, rollback).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The request carried no body at all.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("No input data provided")]
    NoInput,

    /// One or more fields failed validation.
    ///
    /// Returns HTTP 422 Unprocessable Entity with every failing field listed.
    #[error("Validation error")]
    Validation(Vec<FieldError>),

    /// Requested violation does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Violation not found")]
    ViolationNotFound,

    /// No driver profile exists for the requested plate.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Driver profile not found")]
    ProfileNotFound,

    /// Ingest signature header is missing or does not match the body.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid request signature")]
    InvalidSignature,

    /// Request body or parameters are malformed.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Validation errors additionally carry a `details` array of
/// `{"field", "message"}` objects.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NoInput => (StatusCode::BAD_REQUEST, "no_input", self.to_string()),
            AppError::Validation(ref errors) => {
                let body = Json(json!({
                    "error": {
                        "code": "validation_error",
                        "message": self.to_string(),
                        "details": errors,
                    }
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::ViolationNotFound => (
                StatusCode::NOT_FOUND,
                "violation_not_found",
                self.to_string(),
            ),
            AppError::ProfileNotFound => {
                (StatusCode::NOT_FOUND, "profile_not_found", self.to_string())
            }
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(ref e) => {
                tracing::error!("Database failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Errors raised by the offline video processing commands.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("video error: {0}")]
    Video(#[from] opencv::Error),

    #[error("invalid stop line '{input}': {reason}")]
    StopLine { input: String, reason: String },

    #[error("track file {path} line {line}: {reason}")]
    TrackFile {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("no frames found in {0}")]
    NoFrames(String),

    #[error("no clips could be loaded for merging")]
    NoClips,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected request ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
