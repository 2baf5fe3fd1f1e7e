//! Concrete providers. All four share the same HTTP-intent / HMAC-webhook
//! shape, so they're thin configuration wrappers around shared helpers
//! rather than four independent client implementations.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::PaymentError;
use crate::model::ProviderKind;
use crate::provider::{CreateIntentRequest, PaymentProvider, ProviderIntent, ProviderStatus, WebhookEvent};
use crate::webhook::{verify_hmac_signature, WebhookHeaders};

#[derive(Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub webhook_secret: String,
}

/// One HTTP-backed provider client, parameterized by `kind` so the four
/// providers differ only in configuration, not behavior, matching how the
/// orchestrator treats them as interchangeable.
pub struct HttpPaymentProvider {
    kind: ProviderKind,
    http: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpPaymentProvider {
    pub fn new(kind: ProviderKind, http: reqwest::Client, config: HttpProviderConfig) -> Self {
        Self { kind, http, config }
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn create_intent(
        &self,
        req: CreateIntentRequest,
    ) -> Result<ProviderIntent, PaymentError> {
        #[derive(serde::Deserialize)]
        struct IntentResponse {
            intent_ref: String,
            client_payload: String,
        }

        let response = self
            .http
            .post(format!("{}/intents", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "order_id": req.order_id,
                "amount_cents": req.amount_cents,
                "currency": req.currency,
                "method_hint": req.method_hint,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::ProviderUnavailable(format!(
                "{} returned {}",
                self.kind.as_str(),
                response.status()
            )));
        }

        let parsed: IntentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderUnavailable(e.to_string()))?;

        Ok(ProviderIntent {
            intent_ref: parsed.intent_ref,
            client_payload: parsed.client_payload,
            expires_at: Utc::now() + self.kind.intent_ttl(),
        })
    }

    async fn confirm(&self, intent_ref: &str) -> Result<ProviderStatus, PaymentError> {
        #[derive(serde::Deserialize)]
        struct StatusResponse {
            status: String,
        }

        let response = self
            .http
            .get(format!("{}/intents/{intent_ref}", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| PaymentError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::ProviderUnavailable(format!(
                "{} returned {}",
                self.kind.as_str(),
                response.status()
            )));
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderUnavailable(e.to_string()))?;

        Ok(match parsed.status.as_str() {
            "captured" => ProviderStatus::Captured,
            "pending" => ProviderStatus::Pending,
            _ => ProviderStatus::Failed,
        })
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: i64,
    ) -> Result<ProviderStatus, PaymentError> {
        let response = self
            .http
            .post(format!("{}/refunds", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "payment_ref": payment_ref,
                "amount_cents": amount_cents,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::ProviderUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::ProviderUnavailable(format!(
                "{} refund returned {}",
                self.kind.as_str(),
                response.status()
            )));
        }
        Ok(ProviderStatus::Captured)
    }

    fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
        secret: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_hmac_signature(headers, body, secret)?;

        #[derive(serde::Deserialize)]
        struct WebhookBody {
            event_id: String,
            payment_ref: String,
            status: String,
        }
        let parsed: WebhookBody =
            serde_json::from_slice(body).map_err(|_| PaymentError::SignatureInvalid)?;

        let status = match parsed.status.as_str() {
            "captured" => ProviderStatus::Captured,
            "pending" => ProviderStatus::Pending,
            _ => ProviderStatus::Failed,
        };

        Ok(WebhookEvent {
            provider_event_id: parsed.event_id,
            payment_ref: parsed.payment_ref,
            status,
            occurred_at: Utc::now(),
        })
    }
}

/// Builds the standard four-provider set from per-provider configuration.
pub fn build_providers(
    http: reqwest::Client,
    configs: [(ProviderKind, HttpProviderConfig); 4],
) -> Vec<std::sync::Arc<dyn PaymentProvider>> {
    configs
        .into_iter()
        .map(|(kind, cfg)| {
            std::sync::Arc::new(HttpPaymentProvider::new(kind, http.clone(), cfg))
                as std::sync::Arc<dyn PaymentProvider>
        })
        .collect()
}
