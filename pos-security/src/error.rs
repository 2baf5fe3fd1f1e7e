use pos_core::AppError;

#[derive(Debug)]
pub enum SecurityError {
    MissingAuthHeader,
    InvalidAuthScheme,
    TokenRejected(String),
    TokenExpired,
    IntrospectionUnavailable(String),
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::MissingAuthHeader => write!(f, "missing Authorization header"),
            SecurityError::InvalidAuthScheme => write!(f, "invalid authorization scheme"),
            SecurityError::TokenRejected(m) => write!(f, "token rejected: {m}"),
            SecurityError::TokenExpired => write!(f, "token expired"),
            SecurityError::IntrospectionUnavailable(m) => write!(f, "identity provider unavailable: {m}"),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        let message = err.to_string();
        match err {
            SecurityError::MissingAuthHeader => {
                AppError::unauthorized_with_code("token_missing", message)
            }
            SecurityError::InvalidAuthScheme | SecurityError::TokenRejected(_) => {
                AppError::unauthorized_with_code("token_invalid", message)
            }
            SecurityError::TokenExpired => {
                AppError::unauthorized_with_code("token_expired", message)
            }
            SecurityError::IntrospectionUnavailable(_) => {
                AppError::unavailable_with_code("identity_provider_unavailable", message)
            }
        }
    }
}
