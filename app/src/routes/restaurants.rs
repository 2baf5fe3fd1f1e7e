//! Restaurant onboarding and lookup.
//!
//! Creating a restaurant is the one tenant-owned write that happens before a
//! tenant exists: the caller's token has been verified but carries no tenant
//! claim yet (a fresh `restaurant_owner` signup), so this handler can't go
//! through [`pos_db::tx::begin_tenant_scoped`] — there's no tenant id to bind
//! row-level security to. The row-level-security policy on `restaurants`
//! itself must allow an authenticated, tenant-less principal to insert a row
//! it then owns; everything downstream of that (orders, payments, menu)
//! requires a real tenant claim.

use garde::Validate;
use serde::Deserialize;
use sqlx::Row;

use pos_core::http::envelope::ok;
use pos_core::http::{Path, State, StatusCode};
use pos_core::AppError;
use pos_db::tx::begin_tenant_scoped;
use pos_security::identity::{extract_bearer_token, AuthenticatedUser};
use pos_security::tenant::TenantContext;

use crate::auth::Authenticated;
use crate::state::AppState;
use crate::validation::validated;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRestaurantRequest {
    #[garde(length(min = 1, max = 200))]
    pub name: String,
}

/// `POST /api/v1/restaurants` — onboards a new restaurant for the caller.
/// Seeds its order-number counter at 1000 so the first confirmed order in
/// the restaurant's lifetime is numbered 1001.
pub async fn create_restaurant(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<CreateRestaurantRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let body = validated(body)?;
    let token = extract_bearer_token(&headers)?;
    let introspection = state.identity_verifier.verify(token).await?;
    let user = AuthenticatedUser::from(introspection);

    let restaurant_id = uuid::Uuid::new_v4().to_string();
    let mut tx = state.pool.begin().await.map_err(pos_db::error::DbError::from)?;
    sqlx::query(
        "INSERT INTO restaurants (id, name, is_open, catalog_version, owner_user_id) \
         VALUES ($1, $2, true, 0, $3)",
    )
    .bind(&restaurant_id)
    .bind(&body.name)
    .bind(&user.external_user_id)
    .execute(&mut *tx)
    .await
    .map_err(pos_db::error::DbError::from)?;

    sqlx::query(
        "INSERT INTO order_number_counters (restaurant_id, next_number) VALUES ($1, 1000)",
    )
    .bind(&restaurant_id)
    .execute(&mut *tx)
    .await
    .map_err(pos_db::error::DbError::from)?;

    tx.commit().await.map_err(pos_db::error::DbError::from)?;

    tracing::info!(restaurant_id, owner = %user.external_user_id, "restaurant onboarded");

    Ok(pos_core::http::envelope::with_status(
        StatusCode::CREATED,
        serde_json::json!({ "id": restaurant_id, "name": body.name }),
    ))
}

/// `GET /api/v1/restaurants/:id`
pub async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Authenticated(ctx): Authenticated,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &id)?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;
    let row = sqlx::query("SELECT id, name, is_open, catalog_version FROM restaurants WHERE id = $1")
        .bind(&id)
        .fetch_optional(tx.as_mut())
        .await
        .map_err(pos_db::error::DbError::from)?;
    tx.commit().await?;

    let row = row.ok_or_else(|| {
        AppError::not_found_with_code("restaurant_not_found", format!("restaurant {id} not found"))
    })?;
    Ok(ok(serde_json::json!({
        "id": row.get::<String, _>("id"),
        "name": row.get::<String, _>("name"),
        "is_open": row.get::<bool, _>("is_open"),
        "catalog_version": row.get::<i64, _>("catalog_version"),
    })))
}

/// Most restaurant-scoped routes require the path's restaurant id to match
/// the caller's own tenant, unless they're a platform owner acting across
/// tenants.
pub fn require_same_tenant(ctx: &TenantContext, restaurant_id: &str) -> Result<(), AppError> {
    if ctx.is_platform_owner || ctx.tenant_id == restaurant_id {
        Ok(())
    } else {
        Err(AppError::forbidden_with_code(
            "context_mismatch",
            "not a member of this restaurant",
        ))
    }
}
