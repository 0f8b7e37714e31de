//! Crate-wide error type and its HTTP projection.
//!
//! Mirrors the pattern used by the framework's own extractor errors (see
//! [`crate::extractors::query::QueryError`]) — a plain enum with a `Responder`
//! impl — but derives `Display`/`Error` via `thiserror` since `AppError` carries
//! richer source errors than the extractor errors do.

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::responder::Responder;
use crate::types::Response;

/// The crate-wide error enum. Only [`AppError::InputInvalid`] and
/// [`AppError::Internal`] are ever surfaced to an HTTP caller; every other
/// kind is swallowed at the point it occurs (adapter/cache code logs via
/// `tracing` and degrades to an empty or partial result instead of
/// propagating).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InputInvalid(String),

    #[error("adapter {adapter} failed: {source}")]
    AdapterFailure {
        adapter: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("adapter {adapter} timed out")]
    AdapterTimeout { adapter: String },

    #[error("cache read failed: {0}")]
    CacheReadFailure(String),

    #[error("cache write failed: {0}")]
    CacheWriteFailure(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn input_invalid(msg: impl Into<String>) -> Self {
        AppError::InputInvalid(msg.into())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: i32,
    message: String,
}

impl Responder for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InputInvalid(_) => (StatusCode::BAD_REQUEST, 400),
            _ => {
                tracing::error!(error = %self, "internal error surfaced to caller");
                (StatusCode::INTERNAL_SERVER_ERROR, 500)
            }
        };

        let body = ErrorEnvelope {
            code,
            message: self.to_string(),
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());

        let mut resp = Response::new(crate::body::TakoBody::from(bytes::Bytes::from(bytes)));
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_invalid_maps_to_400() {
        let err = AppError::input_invalid("missing keyword");
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_maps_to_500() {
        let err = AppError::Internal(anyhow::anyhow!("boom"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
