//! The stable error domain shared by every layer of the orchestration core.
//!
//! Mirrors the teacher's `CoreError` contract (stable code + human message +
//! optional cause) but collapses it into a closed `enum` instead of an open
//! string code, since the HTTP surface needs an exhaustive status-code
//! mapping rather than a `<namespace>.<reason>` free-form registry.

use serde_json::Value as Json;
use uuid::Uuid;

/// The full error domain. Every public operation in this workspace returns
/// `Result<T, AppError>` (or a thin wrapper around it).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation { message: String, details: Option<Json> },

    #[error("authentication/authorization failed: {message}")]
    Auth { message: String },

    #[error("feature `{feature}` is not enabled for this tenant")]
    FeatureDisabled { feature: String },

    #[error("request falls outside business hours")]
    OutsideBusinessHours {
        window_start: String,
        window_end: String,
        tenant_timezone: String,
        requested_timezone: String,
        requested_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("insufficient credits: need {needed} more (required {required}, available {available})")]
    InsufficientCredits {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
        needed: rust_decimal::Decimal,
    },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("no eligible telephony provider")]
    NoProvider,

    #[error("upstream provider failed: {message}")]
    ProviderFailed { message: String, upstream_detail: Option<Json> },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("internal error (correlation_id={correlation_id})")]
    Internal {
        correlation_id: Uuid,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AppError {
    /// Stable machine-readable kind string, surfaced verbatim in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation",
            AppError::Auth { .. } => "auth",
            AppError::FeatureDisabled { .. } => "feature-disabled",
            AppError::OutsideBusinessHours { .. } => "outside-business-hours",
            AppError::InsufficientCredits { .. } => "insufficient-credits",
            AppError::RateLimited { .. } => "rate-limited",
            AppError::NoProvider => "no-provider",
            AppError::ProviderFailed { .. } => "provider-failed",
            AppError::NotFound { .. } => "not-found",
            AppError::Conflict { .. } => "conflict",
            AppError::Internal { .. } => "internal",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { message: message.into(), details: None }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        AppError::NotFound { entity: entity.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict { message: message.into() }
    }

    /// Wrap an arbitrary failure as `internal`, minting a fresh correlation id.
    /// Callers should `tracing::error!(%correlation_id, ...)` alongside this.
    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        AppError::Internal { correlation_id: Uuid::new_v4(), source: Some(source.into()) }
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            AppError::Internal { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::internal(e)
    }
}

pub type AppResult<T> = Result<T, AppError>;
