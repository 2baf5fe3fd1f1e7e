//! Payment intent creation, webhook ingestion, and refunds.

use garde::Validate;
use serde::Deserialize;

use pos_core::http::envelope::{ok, with_status};
use pos_core::http::{Bytes, HeaderMap, Path, State, StatusCode};
use pos_core::AppError;
use pos_db::tx::begin_tenant_scoped;
use pos_payments::model::ProviderKind;
use pos_payments::webhook::WebhookHeaders;

use crate::auth::Authenticated;
use crate::routes::restaurants::require_same_tenant;
use crate::state::AppState;
use crate::validation::validated;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntentRequest {
    #[garde(skip)]
    pub order_id: uuid::Uuid,
    #[garde(range(min = 1))]
    pub amount_cents: i64,
    #[garde(range(min = 0))]
    pub client_displayed_fee_cents: i64,
    #[garde(length(min = 1))]
    pub idempotency_key: String,
}

/// `POST /api/v1/restaurants/:id/payments/:method/intents` — `method` is the
/// provider kind (`qr`, `sumup`, `stripe`, `apple_pay`) and is parsed from
/// the path rather than trusted from the request body.
pub async fn create_intent(
    State(state): State<AppState>,
    Path((restaurant_id, method)): Path<(String, String)>,
    Authenticated(ctx): Authenticated,
    axum::Json(body): axum::Json<CreateIntentRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;
    let body = validated(body)?;
    let method = ProviderKind::parse(&method)
        .ok_or_else(|| AppError::not_found_with_code("provider_not_found", format!("unknown provider '{method}'")))?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;
    let order_row: Option<(String, i64)> =
        sqlx::query_as("SELECT status, total_cents FROM orders WHERE id = $1 AND restaurant_id = $2")
            .bind(body.order_id)
            .bind(&restaurant_id)
            .fetch_optional(tx.as_mut())
            .await
            .map_err(pos_db::error::DbError::from)?;
    let (status, total_cents) = order_row.ok_or_else(|| {
        AppError::not_found_with_code("order_not_found", format!("order {} not found", body.order_id))
    })?;

    let (payment, intent) = state
        .payments
        .create_intent(
            &mut tx,
            &ctx,
            body.order_id,
            status == "confirmed",
            total_cents,
            Some(method.as_str()),
            body.client_displayed_fee_cents,
            &body.idempotency_key,
        )
        .await?;
    tx.commit().await?;

    Ok(with_status(
        StatusCode::CREATED,
        serde_json::json!({
            "payment": payment,
            "intent_ref": intent.intent_ref,
            "client_payload": intent.client_payload,
            "expires_at": intent.expires_at,
        }),
    ))
}

/// `POST /api/v1/payments/webhook/:provider` — unauthenticated by bearer
/// token; authenticity comes entirely from the provider's HMAC signature.
/// Errors are deliberately generic: a webhook endpoint that distinguishes
/// "bad signature" from "restaurant not found" in its response teaches an
/// attacker which payment refs are real.
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let kind = ProviderKind::parse(&provider).ok_or_else(|| {
        AppError::not_found_with_code("provider_not_found", format!("unknown provider '{provider}'"))
    })?;

    let signature_hex = header_value(&headers, "x-webhook-signature")?;
    let timestamp = header_value(&headers, "x-webhook-timestamp")?
        .parse::<i64>()
        .map_err(|_| AppError::bad_request_with_code("invalid_payload", "invalid x-webhook-timestamp"))?;
    let webhook_headers = WebhookHeaders { signature_hex, timestamp };

    let provider_config = state.config.payments.provider_config(kind);
    let provider_client = pos_payments::providers::HttpPaymentProvider::new(
        kind,
        reqwest::Client::new(),
        pos_payments::providers::HttpProviderConfig {
            base_url: provider_config.base_url.clone(),
            api_key: provider_config.api_key.clone(),
            webhook_secret: provider_config.webhook_secret.clone(),
        },
    );
    let event = pos_payments::provider::PaymentProvider::verify_webhook(
        &provider_client,
        &webhook_headers,
        &body,
        &provider_config.webhook_secret,
    )?;

    // The event carries a `payment_ref` but not a restaurant id; look the
    // payment up by provider + ref first so we know which tenant to scope
    // the rest of the transaction to.
    let restaurant_id: Option<(String,)> =
        sqlx::query_as("SELECT restaurant_id FROM payments WHERE provider = $1 AND provider_ref = $2")
            .bind(kind.as_str())
            .bind(&event.payment_ref)
            .fetch_optional(&state.pool)
            .await
            .map_err(pos_db::error::DbError::from)?;
    let Some((restaurant_id,)) = restaurant_id else {
        // Unknown payment ref: likely a stale/replayed test webhook. Ack
        // with 200 so the provider doesn't retry forever.
        return Ok(StatusCode::OK);
    };

    let ctx = pos_security::tenant::TenantContext {
        tenant_id: restaurant_id.clone(),
        user_id: "webhook".into(),
        email: None,
        roles: vec![],
        is_platform_owner: true,
    };

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;
    let order_total: Option<(uuid::Uuid, i64)> = sqlx::query_as(
        "SELECT o.id, o.total_cents FROM orders o \
         JOIN payments p ON p.order_id = o.id \
         WHERE p.provider = $1 AND p.provider_ref = $2",
    )
    .bind(kind.as_str())
    .bind(&event.payment_ref)
    .fetch_optional(tx.as_mut())
    .await
    .map_err(pos_db::error::DbError::from)?;
    let (_, order_total_cents) = order_total.ok_or_else(|| {
        AppError::not_found_with_code("order_not_found", "order for payment not found")
    })?;

    let event = state
        .payments
        .apply_webhook(&mut tx, &ctx, kind, &event, order_total_cents)
        .await?;
    tx.commit().await?;

    if let Some(event) = event {
        state.payments.publish(event).await;
    }

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    #[garde(range(min = 1))]
    pub amount_cents: i64,
}

/// `POST /api/v1/restaurants/:id/payments/:payment_id/refund`
pub async fn refund(
    State(state): State<AppState>,
    Path((restaurant_id, payment_id)): Path<(String, uuid::Uuid)>,
    Authenticated(ctx): Authenticated,
    axum::Json(body): axum::Json<RefundRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_same_tenant(&ctx, &restaurant_id)?;
    let body = validated(body)?;

    let mut tx = begin_tenant_scoped(&state.pool, &ctx).await?;
    let event = state.payments.refund(&mut tx, &ctx, payment_id, body.amount_cents).await?;
    tx.commit().await?;
    state.payments.publish(event).await;

    Ok(ok(serde_json::json!({ "payment_id": payment_id, "refunded_cents": body.amount_cents })))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request_with_code("invalid_payload", format!("missing {name} header")))
}
