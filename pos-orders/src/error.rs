use pos_core::AppError;

#[derive(Debug)]
pub enum OrderError {
    OrderNotFound(String),
    InvalidTransition { from: String, to: String },
    ProductUnavailable(String),
    RestaurantClosed,
    IdempotencyConflict,
    StaleOrderState { expected: i64, actual: i64 },
    Db(pos_db::error::DbError),
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::OrderNotFound(id) => write!(f, "order {id} not found"),
            OrderError::InvalidTransition { from, to } => {
                write!(f, "cannot transition order from {from} to {to}")
            }
            OrderError::ProductUnavailable(id) => write!(f, "product {id} is not available"),
            OrderError::RestaurantClosed => write!(f, "restaurant is closed"),
            OrderError::IdempotencyConflict => {
                write!(f, "idempotency key reused with a different request")
            }
            OrderError::StaleOrderState { expected, actual } => write!(
                f,
                "expected total {expected} does not match current total {actual}"
            ),
            OrderError::Db(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OrderError {}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        OrderError::Db(pos_db::error::DbError::from(e))
    }
}

impl From<pos_db::error::DbError> for OrderError {
    fn from(e: pos_db::error::DbError) -> Self {
        OrderError::Db(e)
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::OrderNotFound(id) => {
                AppError::not_found_with_code("order_not_found", format!("order {id} not found"))
            }
            OrderError::InvalidTransition { from, to } => AppError::conflict_with_code(
                "invalid_transition",
                format!("cannot transition order from {from} to {to}"),
            ),
            OrderError::ProductUnavailable(id) => AppError::validation_with_code(
                "product_unavailable",
                format!("product {id} is not available"),
            ),
            OrderError::RestaurantClosed => {
                AppError::validation_with_code("restaurant_closed", "restaurant is closed")
            }
            OrderError::IdempotencyConflict => AppError::conflict_with_code(
                "idempotency_conflict",
                "idempotency key reused with a different request",
            ),
            OrderError::StaleOrderState { expected, actual } => AppError::validation_with_code(
                "stale_order_state",
                format!("stale order state: expected total {expected}, actual {actual}"),
            ),
            OrderError::Db(e) => e.into(),
        }
    }
}
