//! Keyed idempotency store for mutating order operations.
//!
//! Keys live alongside the orders they protect so a replay within the same
//! transaction (the engine always checks-then-commits in one transaction)
//! sees a consistent view, and so a key is automatically scoped to its
//! restaurant's row-level security policy.

use sqlx::types::Json;

use pos_db::tx::Tx;

use crate::error::OrderError;

pub enum IdempotencyOutcome<T> {
    /// No prior record; caller should perform the operation and then call
    /// [`record`].
    Proceed,
    /// A prior record exists with a matching fingerprint; its response
    /// should be returned as-is without repeating the operation.
    Replay(T),
}

/// Checks whether `key` has already been used for this restaurant. On a
/// fingerprint mismatch, fails with [`OrderError::IdempotencyConflict`]
/// rather than silently replaying the wrong response.
pub async fn check<T>(
    tx: &mut Tx<'_>,
    restaurant_id: &str,
    key: &str,
    fingerprint: &str,
) -> Result<IdempotencyOutcome<T>, OrderError>
where
    T: serde::de::DeserializeOwned,
{
    let row: Option<(String, Json<serde_json::Value>)> = sqlx::query_as(
        "SELECT request_fingerprint, response_json FROM idempotency_keys \
         WHERE restaurant_id = $1 AND idempotency_key = $2",
    )
    .bind(restaurant_id)
    .bind(key)
    .fetch_optional(tx.as_mut())
    .await?;

    match row {
        None => Ok(IdempotencyOutcome::Proceed),
        Some((stored_fingerprint, response)) if stored_fingerprint == fingerprint => {
            let value: T = serde_json::from_value(response.0).map_err(|e| {
                OrderError::Db(pos_db::error::DbError::Database(sqlx::Error::Decode(
                    Box::new(e),
                )))
            })?;
            Ok(IdempotencyOutcome::Replay(value))
        }
        Some(_) => Err(OrderError::IdempotencyConflict),
    }
}

/// Records the response for a newly-used key. Expires 24 hours out; a
/// periodic sweep (run alongside the other housekeeping jobs) deletes
/// expired rows so the table doesn't grow unbounded.
pub async fn record<T>(
    tx: &mut Tx<'_>,
    restaurant_id: &str,
    key: &str,
    fingerprint: &str,
    response: &T,
) -> Result<(), OrderError>
where
    T: serde::Serialize,
{
    let response_json = serde_json::to_value(response).map_err(|e| {
        OrderError::Db(pos_db::error::DbError::Database(sqlx::Error::Encode(
            Box::new(e),
        )))
    })?;
    sqlx::query(
        "INSERT INTO idempotency_keys (restaurant_id, idempotency_key, request_fingerprint, response_json, expires_at) \
         VALUES ($1, $2, $3, $4, NOW() + INTERVAL '24 hours')",
    )
    .bind(restaurant_id)
    .bind(key)
    .bind(fingerprint)
    .bind(Json(response_json))
    .execute(tx.as_mut())
    .await?;
    Ok(())
}
