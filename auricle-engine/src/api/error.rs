//! HTTP error envelope: `{ "error": { code, message,
//! details? } }`. The error kind carries the HTTP status and machine
//! code; `details` is a free-form JSON blob for heterogeneous
//! diagnostics.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value as Json};

pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Json>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), details: None }
    }

    pub fn empty_file() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "EMPTY_FILE", "the uploaded file is empty")
    }

    pub fn file_too_large(max_bytes: u64) -> Self {
        Self {
            details: Some(json!({ "maxBytes": max_bytes })),
            ..Self::new(StatusCode::BAD_REQUEST, "FILE_TOO_LARGE", "the uploaded file exceeds the size limit")
        }
    }

    pub fn unsupported_format() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT", "the uploaded file is not a recognized audio format")
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "DECODE_FAILED", message)
    }

    pub fn audio_too_short() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "AUDIO_TOO_SHORT", "audio must be at least 3 seconds")
    }

    pub fn audio_too_long() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "AUDIO_TOO_LONG", "audio must be at most 30 minutes")
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    pub fn auth_failed() -> Self {
        Self::new(StatusCode::FORBIDDEN, "AUTH_FAILED", "missing or invalid admin key")
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", "an ingestion is already in progress")
    }

    pub fn search_timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "SEARCH_TIMEOUT", "search exceeded its time budget")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn file_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "FILE_NOT_FOUND", "the archival audio file is missing")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn range_not_satisfiable(total_len: u64) -> Self {
        Self {
            details: Some(json!({ "totalLength": total_len })),
            ..Self::new(StatusCode::RANGE_NOT_SATISFIABLE, "RANGE_NOT_SATISFIABLE", "requested range is outside the file")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
            }
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl From<auricle_common::Error> for ApiError {
    fn from(err: auricle_common::Error) -> Self {
        use auricle_common::Error::*;
        match err {
            NotFound(msg) => ApiError::not_found(msg),
            InvalidInput(msg) => ApiError::validation(msg),
            RateLimited => ApiError::rate_limited(),
            DecodeFailed(msg) => ApiError::decode_failed(msg),
            FingerprintToolMissing(msg) | EmbeddingUnavailable(msg) => ApiError::service_unavailable(msg),
            LaneUnavailable(msg) => ApiError::service_unavailable(msg),
            LaneTimeout(_) => ApiError::search_timeout(),
            Database(e) => ApiError::internal(e.to_string()),
            Io(e) => ApiError::internal(e.to_string()),
            Config(msg) => ApiError::internal(msg),
            Internal(msg) => ApiError::internal(msg),
            IndexWriteFailed(msg) => ApiError::internal(msg),
        }
    }
}
