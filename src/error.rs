//! # Error Handling
//!
//! Custom error types and how they are turned into HTTP responses.
//!
//! ## Response Format:
//! Every error is returned as JSON with a single human-readable field:
//! ```json
//! { "detail": "Fehler: ERROR: [youtube] abc: Video unavailable" }
//! ```
//! Pipeline failures carry the fixed `Fehler: ` tag in front of the
//! underlying message. Validation failures carry the parser's message.
//!
//! ## Status Mapping:
//! - **Validation** → 422 (malformed JSON, missing or non-string `url`)
//! - **NotFound** → 404 (the URL offers no audio-only stream)
//! - **Upstream**, **Transcode**, **Internal** → 500

use crate::media::MediaError;
use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Tag in front of every pipeline failure message.
pub const DETAIL_PREFIX: &str = "Fehler: ";

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Validation**: The request body could not be understood (422)
/// - **NotFound**: The remote video has no audio-only stream (404)
/// - **Upstream**: The platform or the retrieval tool failed (500)
/// - **Transcode**: The transcoder failed or produced nothing (500)
/// - **Internal**: Anything else on the server side (500)
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Upstream(String),
    Transcode(String),
    Internal(String),
}

impl AppError {
    /// Text placed in the `detail` field of the response body.
    pub fn detail(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg)
            | AppError::Upstream(msg)
            | AppError::Transcode(msg)
            | AppError::Internal(msg) => format!("{}{}", DETAIL_PREFIX, msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::Transcode(msg) => write!(f, "Transcode error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) | AppError::Transcode(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "detail": self.detail()
        }))
    }
}

/// The single place pipeline failure kinds become HTTP failure kinds.
impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        let message = err.to_string();
        match err {
            MediaError::NoAudioStream => AppError::NotFound(message),
            MediaError::Resolve(_) | MediaError::Download(_) | MediaError::Timeout { .. } => {
                AppError::Upstream(message)
            }
            MediaError::Transcode(_) => AppError::Transcode(message),
            MediaError::Io(_) => AppError::Internal(message),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error handler for the JSON extractor: body problems become 422s.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

pub type AppResult<T> = Result<T, AppError>;
