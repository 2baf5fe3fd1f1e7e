use pos_core::AppError;

#[derive(Debug)]
pub enum PaymentError {
    ProviderUnavailable(String),
    FeeMismatch { server_fee_cents: i64 },
    DoubleCapture,
    IntentExpired,
    SignatureInvalid,
    RefundExceedsCapture,
    OrderNotConfirmed,
    Db(pos_db::error::DbError),
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentError::ProviderUnavailable(p) => write!(f, "provider '{p}' unavailable"),
            PaymentError::FeeMismatch { server_fee_cents } => {
                write!(f, "fee mismatch: server computed {server_fee_cents} cents")
            }
            PaymentError::DoubleCapture => write!(f, "order already has a captured payment"),
            PaymentError::IntentExpired => write!(f, "payment intent has expired"),
            PaymentError::SignatureInvalid => write!(f, "webhook signature invalid"),
            PaymentError::RefundExceedsCapture => {
                write!(f, "refund amount exceeds captured amount")
            }
            PaymentError::OrderNotConfirmed => write!(f, "order is not in confirmed status"),
            PaymentError::Db(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PaymentError {}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Db(pos_db::error::DbError::from(e))
    }
}

impl From<pos_db::error::DbError> for PaymentError {
    fn from(e: pos_db::error::DbError) -> Self {
        PaymentError::Db(e)
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ProviderUnavailable(p) => AppError::unavailable_with_code(
                "provider_unavailable",
                format!("provider '{p}' unavailable"),
            ),
            PaymentError::FeeMismatch { server_fee_cents } => AppError::validation_with_code(
                "fee_mismatch",
                format!("fee mismatch: server computed {server_fee_cents} cents"),
            ),
            PaymentError::DoubleCapture => AppError::conflict_with_code(
                "double_capture",
                "order already has a captured payment",
            ),
            PaymentError::IntentExpired => {
                AppError::conflict_with_code("intent_expired", "payment intent has expired")
            }
            PaymentError::SignatureInvalid => {
                AppError::bad_request_with_code("signature_invalid", "webhook signature invalid")
            }
            PaymentError::RefundExceedsCapture => AppError::validation_with_code(
                "refund_exceeds_capture",
                "refund amount exceeds captured amount",
            ),
            PaymentError::OrderNotConfirmed => AppError::validation_with_code(
                "order_not_confirmed",
                "order is not in confirmed status",
            ),
            PaymentError::Db(e) => e.into(),
        }
    }
}
