//! Platform-owner-only routes: cross-tenant visibility for internal
//! support/ops tooling. Gated on [`TenantContext::is_platform_owner`], which
//! is allowlist-derived rather than role-derived, so a restaurant owner
//! granting themselves roles in their own data can never reach these.

use sqlx::Row;

use pos_core::http::envelope::ok;
use pos_core::http::State;
use pos_core::AppError;

use crate::auth::Authenticated;
use crate::state::AppState;

pub async fn list_restaurants(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if !ctx.is_platform_owner {
        return Err(AppError::forbidden_with_code("role_insufficient", "platform owner only"));
    }

    let rows = sqlx::query("SELECT id, name, is_open, owner_user_id FROM restaurants ORDER BY name")
        .fetch_all(&state.pool)
        .await
        .map_err(pos_db::error::DbError::from)?;

    let restaurants: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "id": row.get::<String, _>("id"),
                "name": row.get::<String, _>("name"),
                "is_open": row.get::<bool, _>("is_open"),
                "owner_user_id": row.get::<String, _>("owner_user_id"),
            })
        })
        .collect();

    Ok(ok(restaurants))
}
