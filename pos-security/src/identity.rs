//! The platform's concrete [`pos_core::guards::Identity`] implementation,
//! built from an introspection result.

use pos_core::guards::Identity;

use crate::introspection::IntrospectionResult;

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub external_user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub tenant_id: Option<String>,
    pub roles: Vec<String>,
}

impl From<IntrospectionResult> for AuthenticatedUser {
    fn from(result: IntrospectionResult) -> Self {
        Self {
            external_user_id: result.external_user_id,
            email: result.email,
            email_verified: result.email_verified,
            tenant_id: result.tenant_id,
            roles: result.roles,
        }
    }
}

impl Identity for AuthenticatedUser {
    fn subject(&self) -> &str {
        &self.external_user_id
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

/// Extracts a bearer token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, crate::error::SecurityError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(crate::error::SecurityError::MissingAuthHeader)?;
    let value = header
        .to_str()
        .map_err(|_| crate::error::SecurityError::InvalidAuthScheme)?;
    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(crate::error::SecurityError::InvalidAuthScheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc123");
    }

    #[test]
    fn rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert!(extract_bearer_token(&headers).is_err());
    }
}
