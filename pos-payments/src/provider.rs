//! Uniform capability interface every payment provider implements. The
//! orchestrator (`engine.rs`) never branches on provider identity beyond
//! picking which implementation to call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PaymentError;
use crate::model::ProviderKind;
use crate::webhook::WebhookHeaders;

#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub order_id: uuid::Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub method_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderIntent {
    pub intent_ref: String,
    /// Opaque payload the client renders: a QR payload URL, a card-auth
    /// token, or similar, depending on the provider.
    pub client_payload: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Captured,
    Pending,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub provider_event_id: String,
    pub payment_ref: String,
    pub status: ProviderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn create_intent(
        &self,
        req: CreateIntentRequest,
    ) -> Result<ProviderIntent, PaymentError>;

    async fn confirm(&self, intent_ref: &str) -> Result<ProviderStatus, PaymentError>;

    async fn refund(&self, payment_ref: &str, amount_cents: i64) -> Result<ProviderStatus, PaymentError>;

    /// Verifies a webhook's signature and timestamp and, if valid, parses
    /// its event. Never retried by the caller on failure — an invalid
    /// signature gets logged and a bare 400, nothing else.
    fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
        secret: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}
