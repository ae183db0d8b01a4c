//! Maps `AppError` onto the HTTP response the spec's error contract expects:
//! `{"error": {"kind": ..., "message": ..., "correlation_id"?: ...}}` with
//! the status code `kind()` implies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use callhub_core::AppError;

pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::FeatureDisabled { .. } => StatusCode::FORBIDDEN,
            AppError::OutsideBusinessHours { .. } => StatusCode::FORBIDDEN,
            AppError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NoProvider => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ProviderFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if matches!(err, AppError::Internal { .. }) {
            tracing::error!(correlation_id = ?err.correlation_id(), error = %err, "internal error");
        }

        let body = json!({
            "error": {
                "kind": err.kind(),
                "message": err.to_string(),
                "correlation_id": err.correlation_id(),
            }
        });

        (status, Json(body)).into_response()
    }
}
