//! HTTP error mapping for domain and job failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::PackageError;
use jobs::JobError;
use serde_json::json;
use thiserror::Error;

/// Errors a handler can surface to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Job(#[from] JobError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Package(e) => match e {
                PackageError::PackageNotFound { .. } => StatusCode::NOT_FOUND,
                PackageError::ProductUnavailable { .. }
                | PackageError::IllegalTransition { .. } => StatusCode::CONFLICT,
                PackageError::Store(s) if s.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Job(JobError::Scan(s)) if s.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
