//! Request-level authentication: extracts a bearer token, verifies it
//! against the identity provider, and builds the tenant-scoped context every
//! handler downstream of `/api/v1/*` needs.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;

use pos_core::AppError;
use pos_security::identity::{extract_bearer_token, AuthenticatedUser};
use pos_security::tenant::TenantContext;

use crate::state::AppState;

pub struct Authenticated(pub TenantContext);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let introspection = state.identity_verifier.verify(token).await?;
        let user = AuthenticatedUser::from(introspection);
        let ctx = TenantContext::from_identity(&user, &state.config.platform_owner_allowlist)?;
        Ok(Authenticated(ctx))
    }
}

/// `POST /api/v1/auth/verify` — lets a client check a token is still good
/// and see the tenant/roles it resolves to, without hitting a tenant-owned
/// resource.
pub async fn verify_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let token = extract_bearer_token(&headers)?;
    let introspection = state.identity_verifier.verify(token).await?;
    let user = AuthenticatedUser::from(introspection);
    let ctx = TenantContext::from_identity(&user, &state.config.platform_owner_allowlist)?;
    Ok(pos_core::http::envelope::ok(serde_json::json!({
        "subject": user.external_user_id,
        "tenant_id": ctx.tenant_id,
        "roles": ctx.roles,
        "is_platform_owner": ctx.is_platform_owner,
    })))
}
