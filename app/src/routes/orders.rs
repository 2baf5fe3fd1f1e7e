//! Order lifecycle endpoints. Every mutating handler follows the same shape:
//! open a tenant-scoped transaction, call the engine, commit, and only then
//! publish the event the engine handed back — so a subscriber (the
//! real-time bridge included) never observes an event ahead of the
//! committed state it describes.

use garde::Validate;
use serde::{Deserialize, Serialize};

use pos_core::http::envelope::{ok, with_status, Meta};
use pos_core::http::{Path, Query, State, StatusCode};
use pos_core::AppError;
use pos_db::tx::begin_tenant_scoped;
use pos_orders::idempotency::{self, IdempotencyOutcome};
use pos_orders::model::{LinePatch, Order, OrderLine, OrderStatus, OrderType};

use crate::auth::Authenticated;
use crate::routes::restaurants::require_same_tenant;
use crate::state::AppState;
use crate::validation::validated;

/// Reads the caller-supplied idempotency key, if any. Mutating handlers that
/// receive one wrap their engine call with [`idempotency::check`]/[`record`]
/// so a retried request with the same key and body replays the first
/// response instead of repeating the operation.
fn idempotency_key(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateOrderRequest {
    #[garde(skip)]
    pub order_type: String,
    #[garde(length(min = 1))]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OrderLineRequest {
    #[garde(length(min = 1))]
    pub product_id: String,
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(range(min = 0))]
    pub unit_price_cents: i64,
    #[garde(range(min = 1))]
    pub quantity: i32,
}

impl From<OrderLineRequest> for OrderLine {
    fn from(r: OrderLineRequest) -> Self {
        OrderLine {
            product_id: r.product_id,
            name: r.name,
            unit_price_cents: r.unit_price_cents,
            quantity: r.quantity,
        }
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
    Authenticated(ctx): Authenticated,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<CreateOrderRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;
    let body = validated(body)?;
    let order_type = OrderType::parse(&body.order_type).ok_or_else(|| {
        AppError::bad_request_with_code("invalid_payload", format!("unknown order_type '{}'", body.order_type))
    })?;
    let key = idempotency_key(&headers);
    let fingerprint = serde_json::to_string(&body).map_err(AppError::Internal)?;
    let lines: Vec<OrderLine> = body.lines.into_iter().map(Into::into).collect();

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;

    if let Some(key) = &key {
        if let IdempotencyOutcome::Replay(order) =
            idempotency::check::<Order>(&mut tx, &restaurant_id, key, &fingerprint).await?
        {
            tx.commit().await?;
            return Ok(with_status(StatusCode::CREATED, order));
        }
    }

    let order = state.orders.create_order(&mut tx, &ctx, order_type, lines).await?;

    if let Some(key) = &key {
        idempotency::record(&mut tx, &restaurant_id, key, &fingerprint, &order).await?;
    }

    tx.commit().await?;

    Ok(with_status(StatusCode::CREATED, order))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    50
}

pub async fn list_orders(
    State(state): State<AppState>,
    Path(restaurant_id): Path<String>,
    Authenticated(ctx): Authenticated,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;

    let offset = ((query.page.max(1) - 1) * query.page_size) as i64;
    let limit = query.page_size as i64;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;
    let rows: Vec<pos_orders::model::OrderRow> = sqlx::query_as(
        "SELECT id, restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
                tax_cents, service_charge_cents, discount_cents, total_cents, server_id, \
                created_by, event_seq, created_at, updated_at \
         FROM orders WHERE restaurant_id = $1 AND ($2::text IS NULL OR status = $2) \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(&restaurant_id)
    .bind(&query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(tx.as_mut())
    .await
    .map_err(pos_db::error::DbError::from)?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE restaurant_id = $1 AND ($2::text IS NULL OR status = $2)",
    )
    .bind(&restaurant_id)
    .bind(&query.status)
    .fetch_one(tx.as_mut())
    .await
    .map_err(pos_db::error::DbError::from)?;
    tx.commit().await?;

    let orders: Result<Vec<Order>, _> = rows.into_iter().map(Order::try_from).collect();
    let orders = orders.map_err(AppError::Internal)?;

    Ok(ok(orders).with_meta(Meta::pagination(query.page, query.page_size, total.0 as u64)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path((restaurant_id, order_id)): Path<(String, uuid::Uuid)>,
    Authenticated(ctx): Authenticated,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;
    let row: Option<pos_orders::model::OrderRow> = sqlx::query_as(
        "SELECT id, restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
                tax_cents, service_charge_cents, discount_cents, total_cents, server_id, \
                created_by, event_seq, created_at, updated_at \
         FROM orders WHERE id = $1 AND restaurant_id = $2",
    )
    .bind(order_id)
    .bind(&restaurant_id)
    .fetch_optional(tx.as_mut())
    .await
    .map_err(pos_db::error::DbError::from)?;
    tx.commit().await?;

    let row = row.ok_or_else(|| {
        AppError::not_found_with_code("order_not_found", format!("order {order_id} not found"))
    })?;
    let order = Order::try_from(row).map_err(AppError::Internal)?;
    Ok(ok(order))
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct UpdateLinesRequest {
    #[garde(dive)]
    pub add: Vec<OrderLineRequest>,
    #[garde(skip)]
    pub remove_product_ids: Vec<String>,
    #[garde(dive)]
    pub modify: Vec<OrderLineRequest>,
    #[garde(range(min = 0))]
    #[serde(default)]
    pub tax_cents: i64,
    #[garde(range(min = 0))]
    #[serde(default)]
    pub service_charge_cents: i64,
    #[garde(range(min = 0))]
    #[serde(default)]
    pub discount_cents: i64,
}

pub async fn update_lines(
    State(state): State<AppState>,
    Path((restaurant_id, order_id)): Path<(String, uuid::Uuid)>,
    Authenticated(ctx): Authenticated,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<UpdateLinesRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;
    let body = validated(body)?;

    let key = idempotency_key(&headers);
    let fingerprint = serde_json::to_string(&body).map_err(AppError::Internal)?;

    let patch = LinePatch {
        add: body.add.into_iter().map(Into::into).collect(),
        remove_product_ids: body.remove_product_ids,
        modify: body.modify.into_iter().map(Into::into).collect(),
    };

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;

    if let Some(key) = &key {
        if let IdempotencyOutcome::Replay(order) =
            idempotency::check::<Order>(&mut tx, &restaurant_id, key, &fingerprint).await?
        {
            tx.commit().await?;
            return Ok(ok(order));
        }
    }

    let order = state
        .orders
        .update_lines(
            &mut tx,
            &ctx,
            order_id,
            patch,
            body.tax_cents,
            body.service_charge_cents,
            body.discount_cents,
        )
        .await?;

    if let Some(key) = &key {
        idempotency::record(&mut tx, &restaurant_id, key, &fingerprint, &order).await?;
    }

    tx.commit().await?;

    Ok(ok(order))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConfirmOrderRequest {
    pub expected_total: Option<i64>,
}

pub async fn confirm_order(
    State(state): State<AppState>,
    Path((restaurant_id, order_id)): Path<(String, uuid::Uuid)>,
    Authenticated(ctx): Authenticated,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<ConfirmOrderRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;

    let key = idempotency_key(&headers);
    let fingerprint = serde_json::to_string(&body).map_err(AppError::Internal)?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;

    if let Some(key) = &key {
        if let IdempotencyOutcome::Replay(order) =
            idempotency::check::<Order>(&mut tx, &restaurant_id, key, &fingerprint).await?
        {
            tx.commit().await?;
            return Ok(ok(order));
        }
    }

    let (order, event) = state
        .orders
        .confirm(&mut tx, &ctx, order_id, body.expected_total)
        .await?;

    if let Some(key) = &key {
        idempotency::record(&mut tx, &restaurant_id, key, &fingerprint, &order).await?;
    }

    tx.commit().await?;
    state.orders.publish(event).await;

    Ok(ok(order))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AdvanceOrderRequest {
    pub target: String,
    pub expected_total: Option<i64>,
}

pub async fn advance_order(
    State(state): State<AppState>,
    Path((restaurant_id, order_id)): Path<(String, uuid::Uuid)>,
    Authenticated(ctx): Authenticated,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<AdvanceOrderRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;
    let target = OrderStatus::parse(&body.target).ok_or_else(|| {
        AppError::bad_request_with_code("invalid_payload", format!("unknown order status '{}'", body.target))
    })?;

    let key = idempotency_key(&headers);
    let fingerprint = serde_json::to_string(&body).map_err(AppError::Internal)?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;

    if let Some(key) = &key {
        if let IdempotencyOutcome::Replay(order) =
            idempotency::check::<Order>(&mut tx, &restaurant_id, key, &fingerprint).await?
        {
            tx.commit().await?;
            return Ok(ok(order));
        }
    }

    let (order, event) = state
        .orders
        .advance_status(&mut tx, &ctx, order_id, target, body.expected_total)
        .await?;

    if let Some(key) = &key {
        idempotency::record(&mut tx, &restaurant_id, key, &fingerprint, &order).await?;
    }

    tx.commit().await?;
    state.orders.publish(event).await;

    Ok(ok(order))
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CancelOrderRequest {
    #[garde(length(min = 1, max = 500))]
    pub reason: String,
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path((restaurant_id, order_id)): Path<(String, uuid::Uuid)>,
    Authenticated(ctx): Authenticated,
    headers: axum::http::HeaderMap,
    axum::Json(body): axum::Json<CancelOrderRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;
    let body = validated(body)?;

    let key = idempotency_key(&headers);
    let fingerprint = serde_json::to_string(&body).map_err(AppError::Internal)?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;

    if let Some(key) = &key {
        if let IdempotencyOutcome::Replay(order) =
            idempotency::check::<Order>(&mut tx, &restaurant_id, key, &fingerprint).await?
        {
            tx.commit().await?;
            return Ok(ok(order));
        }
    }

    let (order, event) = state.orders.cancel(&mut tx, &ctx, order_id, &body.reason).await?;

    if let Some(key) = &key {
        idempotency::record(&mut tx, &restaurant_id, key, &fingerprint, &order).await?;
    }

    tx.commit().await?;
    state.orders.publish(event).await;

    Ok(ok(order))
}
