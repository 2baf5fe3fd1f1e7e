use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Qr,
    SumUp,
    Stripe,
    ApplePay,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Qr => "qr",
            ProviderKind::SumUp => "sumup",
            ProviderKind::Stripe => "stripe",
            ProviderKind::ApplePay => "apple_pay",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "qr" => ProviderKind::Qr,
            "sumup" => ProviderKind::SumUp,
            "stripe" => ProviderKind::Stripe,
            "apple_pay" => ProviderKind::ApplePay,
            _ => return None,
        })
    }

    /// Default selection order: lowest fee first. Actual selection also
    /// filters by what the customer's chosen method supports and by
    /// per-restaurant provider disablement.
    pub fn by_ascending_fee() -> [ProviderKind; 4] {
        [
            ProviderKind::Qr,
            ProviderKind::SumUp,
            ProviderKind::Stripe,
            ProviderKind::ApplePay,
        ]
    }

    /// How long a created intent remains capturable before it's considered
    /// expired and the periodic sweeper reconciles it.
    pub fn intent_ttl(&self) -> chrono::Duration {
        match self {
            ProviderKind::Qr => chrono::Duration::minutes(15),
            _ => chrono::Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => PaymentStatus::Pending,
            "captured" => PaymentStatus::Captured,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: uuid::Uuid,
    pub restaurant_id: String,
    pub order_id: uuid::Uuid,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub amount_cents: i64,
    pub status: String,
    pub commission_rate_bps: Option<i32>,
    pub commission_amount_cents: Option<i64>,
    pub refund_of: Option<uuid::Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: uuid::Uuid,
    pub restaurant_id: String,
    pub order_id: uuid::Uuid,
    pub provider: ProviderKind,
    pub provider_ref: Option<String>,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub commission_rate_bps: Option<i32>,
    pub commission_amount_cents: Option<i64>,
    pub refund_of: Option<uuid::Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = String;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            restaurant_id: row.restaurant_id,
            order_id: row.order_id,
            provider: ProviderKind::parse(&row.provider)
                .ok_or_else(|| format!("unknown provider '{}'", row.provider))?,
            provider_ref: row.provider_ref,
            amount_cents: row.amount_cents,
            status: PaymentStatus::parse(&row.status)
                .ok_or_else(|| format!("unknown payment status '{}'", row.status))?,
            commission_rate_bps: row.commission_rate_bps,
            commission_amount_cents: row.commission_amount_cents,
            refund_of: row.refund_of,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips() {
        for p in [
            ProviderKind::Qr,
            ProviderKind::SumUp,
            ProviderKind::Stripe,
            ProviderKind::ApplePay,
        ] {
            assert_eq!(ProviderKind::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn qr_intents_live_longer_than_card_intents() {
        assert!(ProviderKind::Qr.intent_ttl() > ProviderKind::Stripe.intent_ttl());
    }
}
