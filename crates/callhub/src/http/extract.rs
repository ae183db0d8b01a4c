//! Principal and schema extraction from request headers. Authn/authz proper
//! is an out-of-scope collaborator (§2 Non-goals); this reads whatever that
//! collaborator would have attached as `x-tenant-id`/`x-subject-id` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use callhub_core::ids::TenantId;
use callhub_core::principal::CallerPrincipal;
use callhub_core::AppError;

use crate::http::error::ApiError;

pub struct Principal(pub CallerPrincipal);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_header = parts
            .headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(AppError::Auth { message: "missing x-tenant-id header".into() }))?;
        let tenant_id: Uuid = tenant_header
            .parse()
            .map_err(|_| ApiError(AppError::Auth { message: "x-tenant-id is not a UUID".into() }))?;

        Ok(Principal(CallerPrincipal::service_call(TenantId::from(tenant_id))))
    }
}

pub fn timezone_hint_from_header(parts: &Parts) -> Option<String> {
    parts.headers.get("x-timezone").and_then(|v| v.to_str().ok()).map(str::to_string)
}
