use crate::utils::error::FitCheckError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Handler error rendered as `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }
}

pub(crate) fn error_status(err: &FitCheckError) -> StatusCode {
    match err {
        FitCheckError::NotFoundError { .. } => StatusCode::NOT_FOUND,
        FitCheckError::InvalidIdError { .. }
        | FitCheckError::ValidationError { .. }
        | FitCheckError::CsvError(_) => StatusCode::BAD_REQUEST,
        FitCheckError::ApiError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FitCheckError> for ApiError {
    fn from(err: FitCheckError) -> Self {
        let status = error_status(&err);
        let detail = match &err {
            FitCheckError::InvalidIdError { .. } => "Invalid ID format".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(
                "Request failed: {} (Category: {:?}, Severity: {:?})",
                err,
                err.category(),
                err.severity()
            );
        } else {
            tracing::debug!("Request rejected with {}: {}", status, detail);
        }

        Self::new(status, detail)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
