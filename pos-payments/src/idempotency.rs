//! Two independent idempotency keys: intent creation is keyed by
//! `(order_id, client_idempotency_key)`; webhook processing is keyed by
//! `(provider, provider_event_id)`. They're stored in separate tables
//! because the second one never carries a request fingerprint to compare
//! against — a duplicate webhook delivery is always a no-op, never a
//! conflict.

use pos_db::tx::Tx;

use crate::error::PaymentError;

pub async fn intent_already_created(
    tx: &mut Tx<'_>,
    order_id: uuid::Uuid,
    client_idempotency_key: &str,
) -> Result<Option<uuid::Uuid>, PaymentError> {
    let row: Option<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT payment_id FROM payment_intent_idempotency \
         WHERE order_id = $1 AND client_idempotency_key = $2",
    )
    .bind(order_id)
    .bind(client_idempotency_key)
    .fetch_optional(tx.as_mut())
    .await?;
    Ok(row.map(|(id,)| id))
}

pub async fn record_intent(
    tx: &mut Tx<'_>,
    order_id: uuid::Uuid,
    client_idempotency_key: &str,
    payment_id: uuid::Uuid,
) -> Result<(), PaymentError> {
    sqlx::query(
        "INSERT INTO payment_intent_idempotency (order_id, client_idempotency_key, payment_id) \
         VALUES ($1, $2, $3)",
    )
    .bind(order_id)
    .bind(client_idempotency_key)
    .bind(payment_id)
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

/// Returns `true` if this `(provider, provider_event_id)` pair has already
/// been processed; in that case the caller should treat the webhook as a
/// no-op rather than re-applying its side effects.
pub async fn webhook_already_processed(
    tx: &mut Tx<'_>,
    provider: &str,
    provider_event_id: &str,
) -> Result<bool, PaymentError> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT 1 FROM webhook_events WHERE provider = $1 AND provider_event_id = $2",
    )
    .bind(provider)
    .bind(provider_event_id)
    .fetch_optional(tx.as_mut())
    .await?;
    Ok(row.is_some())
}

pub async fn record_webhook(
    tx: &mut Tx<'_>,
    provider: &str,
    provider_event_id: &str,
) -> Result<(), PaymentError> {
    sqlx::query(
        "INSERT INTO webhook_events (provider, provider_event_id, processed_at) \
         VALUES ($1, $2, NOW()) ON CONFLICT DO NOTHING",
    )
    .bind(provider)
    .bind(provider_event_id)
    .execute(tx.as_mut())
    .await?;
    Ok(())
}
