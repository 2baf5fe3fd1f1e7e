//! Uniform application error type and its mapping onto the HTTP envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Every fallible operation in the platform returns `Result<T, AppError>`.
///
/// Each variant carries the machine-readable `code` that ends up verbatim in
/// the `error.code` field of the HTTP envelope (see `pos_core::http::envelope`).
/// Only `Internal` collapses distinct failures onto one code; everything else
/// is expected to carry the specific code for what actually went wrong.
#[derive(Debug)]
pub enum AppError {
    /// Malformed request: bad JSON, missing required field, wrong type.
    BadRequest { code: &'static str, message: String },
    /// Body passed parsing but failed validation rules (garde/domain rules).
    Validation { code: &'static str, message: String },
    /// No credentials, or credentials that do not verify.
    Unauthorized { code: &'static str, message: String },
    /// Credentials verify but the tenant/role does not permit the action.
    Forbidden { code: &'static str, message: String },
    /// Referenced entity does not exist (or is not visible to this tenant).
    NotFound { code: &'static str, message: String },
    /// The request conflicts with current state (version mismatch, duplicate).
    Conflict { code: &'static str, message: String },
    /// Caller exceeded a rate limit; `retry_after` is seconds until reset.
    RateLimited { retry_after: u64 },
    /// A payment provider declined the operation; not a bug, a business outcome.
    PaymentDeclined(String),
    /// A downstream dependency (DB, identity provider, payment provider) is down.
    Unavailable { code: &'static str, message: String },
    /// Anything else: bugs, panics converted to errors, unexpected driver errors.
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest { code: "invalid_payload", message: message.into() }
    }

    pub fn bad_request_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest { code, message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation { code: "invalid_payload", message: message.into() }
    }

    pub fn validation_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation { code, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized { code: "token_invalid", message: message.into() }
    }

    pub fn unauthorized_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthorized { code, message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden { code: "role_insufficient", message: message.into() }
    }

    pub fn forbidden_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Forbidden { code, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound { code: "not_found", message: message.into() }
    }

    pub fn not_found_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::NotFound { code, message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict { code: "conflict", message: message.into() }
    }

    pub fn conflict_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict { code, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        AppError::Unavailable { code: "service_unavailable", message: message.into() }
    }

    pub fn unavailable_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unavailable { code, message: message.into() }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. } => code,
            AppError::Validation { code, .. } => code,
            AppError::Unauthorized { code, .. } => code,
            AppError::Forbidden { code, .. } => code,
            AppError::NotFound { code, .. } => code,
            AppError::Conflict { code, .. } => code,
            AppError::RateLimited { .. } => "rate_limited",
            AppError::PaymentDeclined(_) => "payment_declined",
            AppError::Unavailable { code, .. } => code,
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client. Internal errors never leak detail.
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "an internal error occurred".to_string(),
            AppError::Unavailable { message, .. } => message.clone(),
            AppError::BadRequest { message, .. }
            | AppError::Validation { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::PaymentDeclined(message) => message.clone(),
            AppError::RateLimited { retry_after } => {
                format!("rate limit exceeded, retry after {retry_after}s")
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.public_message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Internal(_) | AppError::Unavailable { .. }) {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let status = self.status();
        let retry_after = if let AppError::RateLimited { retry_after } = &self {
            Some(*retry_after)
        } else {
            None
        };
        let body = json!({
            "success": false,
            "data": null,
            "error": {
                "code": self.code(),
                "message": self.public_message(),
            },
            "meta": null,
        });
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

/// Bulk-implements `From<E> for AppError` for error types that should always
/// become `AppError::Internal`. Mirrors how driver errors (sqlx, reqwest) get
/// folded into the single application error type without individual `impl`s.
#[macro_export]
macro_rules! map_internal_error {
    ($($err:ty),+ $(,)?) => {
        $(
            impl From<$err> for $crate::error::AppError {
                fn from(e: $err) -> Self {
                    $crate::error::AppError::Internal(e.to_string())
                }
            }
        )+
    };
}

map_internal_error!(std::io::Error, serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(AppError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::RateLimited { retry_after: 5 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::PaymentDeclined("x".into()).status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(AppError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn codes_are_preserved_verbatim() {
        assert_eq!(
            AppError::unauthorized_with_code("token_expired", "x").code(),
            "token_expired"
        );
        assert_eq!(
            AppError::conflict_with_code("double_capture", "x").code(),
            "double_capture"
        );
        assert_eq!(AppError::Internal("anything".into()).code(), "internal");
    }

    #[test]
    fn internal_errors_never_leak_detail() {
        let err = AppError::Internal("leaked connection string: postgres://...".into());
        assert_eq!(err.public_message(), "an internal error occurred");
    }

    #[test]
    fn business_errors_pass_their_message_through() {
        let err = AppError::conflict("order total mismatch");
        assert_eq!(err.public_message(), "order total mismatch");
    }
}
