//! Payment orchestrator: provider selection, fee verification, the
//! create-intent / webhook-capture protocol, and refunds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use pos_db::tx::Tx;
use pos_events::EventBus;
use pos_security::tenant::TenantContext;

use crate::error::PaymentError;
use crate::events::{PaymentEvent, PaymentEventKind};
use crate::fees::{check_fee_agreement, compute_fees, FeeRates};
use crate::idempotency;
use crate::model::{Payment, PaymentRow, PaymentStatus, ProviderKind};
use crate::provider::{CreateIntentRequest, PaymentProvider, ProviderIntent, WebhookEvent};
use crate::provider::ProviderStatus as RemoteStatus;

pub struct PaymentOrchestrator<B: EventBus> {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
    /// Providers a restaurant has explicitly disabled, keyed by restaurant id.
    disabled: Arc<dyn Fn(&str, ProviderKind) -> bool + Send + Sync>,
    fee_rates: FeeRates,
    bus: B,
}

impl<B> PaymentOrchestrator<B>
where
    B: EventBus + Clone + 'static,
{
    pub fn new(
        providers: Vec<Arc<dyn PaymentProvider>>,
        disabled: impl Fn(&str, ProviderKind) -> bool + Send + Sync + 'static,
        fee_rates: FeeRates,
        bus: B,
    ) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.kind(), p)).collect(),
            disabled: Arc::new(disabled),
            fee_rates,
            bus,
        }
    }

    fn select_provider(
        &self,
        restaurant_id: &str,
        method_hint: Option<&str>,
    ) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        let preferred = method_hint.and_then(ProviderKind::parse);
        let candidates: Vec<ProviderKind> = match preferred {
            Some(kind) => vec![kind],
            None => ProviderKind::by_ascending_fee().to_vec(),
        };
        candidates
            .into_iter()
            .find(|kind| !(self.disabled)(restaurant_id, *kind))
            .and_then(|kind| self.providers.get(&kind).cloned())
            .ok_or_else(|| PaymentError::ProviderUnavailable("no eligible provider".into()))
    }

    /// Step 1 of the capture protocol. Verifies the order is confirmed
    /// (caller passes the already-locked order's status and total),
    /// computes fees, checks the client's displayed fee agrees within a
    /// cent, creates the provider-side intent, and persists a `pending`
    /// payment row keyed for idempotent retry.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_intent(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_id: uuid::Uuid,
        order_is_confirmed: bool,
        amount_cents: i64,
        method_hint: Option<&str>,
        client_displayed_fee_cents: i64,
        client_idempotency_key: &str,
    ) -> Result<(Payment, ProviderIntent), PaymentError> {
        if !order_is_confirmed {
            return Err(PaymentError::OrderNotConfirmed);
        }

        if let Some(existing_payment_id) =
            idempotency::intent_already_created(tx, order_id, client_idempotency_key).await?
        {
            let row: PaymentRow = sqlx::query_as(
                "SELECT id, restaurant_id, order_id, provider, provider_ref, amount_cents, \
                        status, commission_rate_bps, commission_amount_cents, refund_of, \
                        created_at, updated_at FROM payments WHERE id = $1",
            )
            .bind(existing_payment_id)
            .fetch_one(tx.as_mut())
            .await?;
            let payment = Payment::try_from(row).map_err(decode_err)?;
            // The provider intent itself isn't persisted verbatim; replaying
            // a create-intent call re-fetches it from the provider by ref
            // rather than caching the (possibly time-limited) client payload.
            let provider = self
                .providers
                .get(&payment.provider)
                .cloned()
                .ok_or_else(|| PaymentError::ProviderUnavailable(payment.provider.as_str().into()))?;
            let provider_ref = payment
                .provider_ref
                .clone()
                .ok_or_else(|| PaymentError::ProviderUnavailable("missing provider ref".into()))?;
            let status = provider.confirm(&provider_ref).await?;
            return Ok((
                payment,
                ProviderIntent {
                    intent_ref: provider_ref,
                    client_payload: format!("{status:?}"),
                    expires_at: Utc::now(),
                },
            ));
        }

        let fees = compute_fees(amount_cents, self.fee_rates);
        check_fee_agreement(client_displayed_fee_cents, fees.total_fee_cents)
            .map_err(|server_fee_cents| PaymentError::FeeMismatch { server_fee_cents })?;

        let provider = self.select_provider(&ctx.tenant_id, method_hint)?;
        let intent = provider
            .create_intent(CreateIntentRequest {
                order_id,
                amount_cents,
                currency: "EUR".into(),
                method_hint: method_hint.map(str::to_string),
            })
            .await?;

        let row: PaymentRow = sqlx::query_as(
            "INSERT INTO payments \
             (restaurant_id, order_id, provider, provider_ref, amount_cents, status) \
             VALUES ($1, $2, $3, $4, $5, 'pending') \
             RETURNING id, restaurant_id, order_id, provider, provider_ref, amount_cents, \
                       status, commission_rate_bps, commission_amount_cents, refund_of, \
                       created_at, updated_at",
        )
        .bind(&ctx.tenant_id)
        .bind(order_id)
        .bind(provider.kind().as_str())
        .bind(&intent.intent_ref)
        .bind(amount_cents)
        .fetch_one(tx.as_mut())
        .await?;
        let payment = Payment::try_from(row).map_err(decode_err)?;

        idempotency::record_intent(tx, order_id, client_idempotency_key, payment.id).await?;

        Ok((payment, intent))
    }

    /// Step 3 of the capture protocol, driven by a verified webhook (or the
    /// periodic sweeper's poll). No-ops if this `(provider, event_id)` pair
    /// was already processed. Fails the capture with `DoubleCapture` if
    /// another payment for the order is already `captured`; the caller is
    /// expected to ask the provider to refund in that case.
    pub async fn apply_webhook(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        provider: ProviderKind,
        event: &WebhookEvent,
        order_total_cents: i64,
    ) -> Result<Option<PaymentEvent>, PaymentError> {
        if idempotency::webhook_already_processed(tx, provider.as_str(), &event.provider_event_id)
            .await?
        {
            return Ok(None);
        }

        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT id, restaurant_id, order_id, provider, provider_ref, amount_cents, \
                    status, commission_rate_bps, commission_amount_cents, refund_of, \
                    created_at, updated_at \
             FROM payments WHERE restaurant_id = $1 AND provider = $2 AND provider_ref = $3 \
             FOR UPDATE",
        )
        .bind(&ctx.tenant_id)
        .bind(provider.as_str())
        .bind(&event.payment_ref)
        .fetch_optional(tx.as_mut())
        .await?;
        let Some(row) = row else {
            idempotency::record_webhook(tx, provider.as_str(), &event.provider_event_id).await?;
            return Ok(None);
        };
        let payment = Payment::try_from(row).map_err(decode_err)?;

        if event.status != RemoteStatus::Captured {
            sqlx::query("UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1")
                .bind(payment.id)
                .execute(tx.as_mut())
                .await?;
            idempotency::record_webhook(tx, provider.as_str(), &event.provider_event_id).await?;
            return Ok(Some(PaymentEvent {
                restaurant_id: ctx.tenant_id.clone(),
                order_id: payment.order_id,
                payment_id: payment.id,
                provider,
                kind: PaymentEventKind::Failed,
                occurred_at: Utc::now(),
            }));
        }

        let already_captured: Option<(uuid::Uuid,)> = sqlx::query_as(
            "SELECT id FROM payments WHERE order_id = $1 AND status = 'captured' AND id != $2 \
             FOR UPDATE",
        )
        .bind(payment.order_id)
        .bind(payment.id)
        .fetch_optional(tx.as_mut())
        .await?;
        if already_captured.is_some() {
            sqlx::query("UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1")
                .bind(payment.id)
                .execute(tx.as_mut())
                .await?;
            idempotency::record_webhook(tx, provider.as_str(), &event.provider_event_id).await?;
            return Err(PaymentError::DoubleCapture);
        }

        sqlx::query(
            "UPDATE payments SET status = 'failed', updated_at = NOW() \
             WHERE order_id = $1 AND status = 'pending' AND id != $2",
        )
        .bind(payment.order_id)
        .bind(payment.id)
        .execute(tx.as_mut())
        .await?;

        let commission_rate_bps = self.fee_rates.platform_fee_bps;
        let commission_amount_cents = compute_fees(payment.amount_cents, self.fee_rates).platform_fee_cents;

        sqlx::query(
            "UPDATE payments SET status = 'captured', commission_rate_bps = $1, \
             commission_amount_cents = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(commission_rate_bps)
        .bind(commission_amount_cents)
        .bind(payment.id)
        .execute(tx.as_mut())
        .await?;

        if payment.amount_cents >= order_total_cents {
            sqlx::query(
                "UPDATE orders SET status = 'completed', event_seq = event_seq + 1, updated_at = NOW() \
                 WHERE id = $1 AND restaurant_id = $2 AND status = 'confirmed'",
            )
            .bind(payment.order_id)
            .bind(&ctx.tenant_id)
            .execute(tx.as_mut())
            .await?;
        }

        idempotency::record_webhook(tx, provider.as_str(), &event.provider_event_id).await?;

        Ok(Some(PaymentEvent {
            restaurant_id: ctx.tenant_id.clone(),
            order_id: payment.order_id,
            payment_id: payment.id,
            provider,
            kind: PaymentEventKind::Captured,
            occurred_at: Utc::now(),
        }))
    }

    /// Full or partial refund. Fails with `RefundExceedsCapture` if the
    /// cumulative refunded amount would exceed what was captured.
    pub async fn refund(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        payment_id: uuid::Uuid,
        amount_cents: i64,
    ) -> Result<PaymentEvent, PaymentError> {
        let row: PaymentRow = sqlx::query_as(
            "SELECT id, restaurant_id, order_id, provider, provider_ref, amount_cents, \
                    status, commission_rate_bps, commission_amount_cents, refund_of, \
                    created_at, updated_at \
             FROM payments WHERE id = $1 AND restaurant_id = $2 FOR UPDATE",
        )
        .bind(payment_id)
        .bind(&ctx.tenant_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or_else(|| PaymentError::Db(pos_db::error::DbError::NotFound(payment_id.to_string())))?;
        let payment = Payment::try_from(row).map_err(decode_err)?;

        let (already_refunded,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(-amount_cents), 0) FROM payments WHERE refund_of = $1",
        )
        .bind(payment.id)
        .fetch_one(tx.as_mut())
        .await?;

        if already_refunded + amount_cents > payment.amount_cents {
            return Err(PaymentError::RefundExceedsCapture);
        }

        let provider = self
            .providers
            .get(&payment.provider)
            .cloned()
            .ok_or_else(|| PaymentError::ProviderUnavailable(payment.provider.as_str().into()))?;
        let provider_ref = payment
            .provider_ref
            .clone()
            .ok_or_else(|| PaymentError::ProviderUnavailable("missing provider ref".into()))?;
        provider.refund(&provider_ref, amount_cents).await?;

        sqlx::query(
            "INSERT INTO payments (restaurant_id, order_id, provider, provider_ref, amount_cents, status, refund_of) \
             VALUES ($1, $2, $3, $4, $5, 'captured', $6)",
        )
        .bind(&ctx.tenant_id)
        .bind(payment.order_id)
        .bind(payment.provider.as_str())
        .bind(&payment.provider_ref)
        .bind(-amount_cents)
        .bind(payment.id)
        .execute(tx.as_mut())
        .await?;

        if already_refunded + amount_cents == payment.amount_cents {
            sqlx::query(
                "UPDATE orders SET status = 'refunded', event_seq = event_seq + 1, updated_at = NOW() \
                 WHERE id = $1 AND restaurant_id = $2",
            )
            .bind(payment.order_id)
            .bind(&ctx.tenant_id)
            .execute(tx.as_mut())
            .await?;
        }

        Ok(PaymentEvent {
            restaurant_id: ctx.tenant_id.clone(),
            order_id: payment.order_id,
            payment_id: payment.id,
            provider: payment.provider,
            kind: PaymentEventKind::Refunded,
            occurred_at: Utc::now(),
        })
    }

    /// Publishes an event returned by `apply_webhook`/`refund`. Must only be
    /// called after the transaction that produced it has committed.
    pub async fn publish(&self, event: PaymentEvent) {
        self.bus.emit_and_wait(event).await;
    }

    pub fn status_from_remote(status: RemoteStatus) -> PaymentStatus {
        match status {
            RemoteStatus::Captured => PaymentStatus::Captured,
            RemoteStatus::Pending => PaymentStatus::Pending,
            RemoteStatus::Failed => PaymentStatus::Failed,
        }
    }
}

fn decode_err(message: String) -> PaymentError {
    PaymentError::Db(pos_db::error::DbError::Database(sqlx::Error::Decode(
        message.into(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_remote_maps_one_to_one() {
        assert_eq!(
            PaymentOrchestrator::<pos_events::LocalEventBus>::status_from_remote(RemoteStatus::Captured),
            PaymentStatus::Captured
        );
        assert_eq!(
            PaymentOrchestrator::<pos_events::LocalEventBus>::status_from_remote(RemoteStatus::Pending),
            PaymentStatus::Pending
        );
    }
}
