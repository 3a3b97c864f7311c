//! Application error type mapping to HTTP status codes and the envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowrun_core::service::flow_run::ServiceError;

use super::response::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    /// Run service failure (storage, unknown run).
    Service(ServiceError),
    /// Rejected request input.
    Validation(String),
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        AppError::Service(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Service(ServiceError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "RUN_NOT_FOUND",
                format!("Run {id} not found"),
            ),
            AppError::Service(e @ ServiceError::Repository(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }
        (status, ApiResponse::error(code, &message)).into_response()
    }
}
