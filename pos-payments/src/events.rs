use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub restaurant_id: String,
    pub order_id: uuid::Uuid,
    pub payment_id: uuid::Uuid,
    pub provider: ProviderKind,
    pub kind: PaymentEventKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Captured,
    Failed,
    Refunded,
}

impl PaymentEvent {
    pub fn topic(&self) -> &'static str {
        match self.kind {
            PaymentEventKind::Captured => "payment.captured",
            PaymentEventKind::Failed => "payment.failed",
            PaymentEventKind::Refunded => "payment.refunded",
        }
    }
}
