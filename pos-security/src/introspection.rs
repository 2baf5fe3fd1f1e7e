//! External token introspection (the Identity Verifier).
//!
//! Tokens themselves are opaque to this platform — they're handed, as-is, to
//! an external identity provider's introspection endpoint, which answers
//! whether the token is currently valid and who it belongs to. Results are
//! cached briefly, keyed by a hash of the token (never the token itself),
//! so a burst of requests on one connection doesn't re-introspect on every
//! message.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::SecurityError;

/// Cache entries live at most this long, regardless of the token's own
/// remaining lifetime.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(60);

/// Once a token has less than this long left before `exp`, the cache is
/// bypassed entirely and every request re-introspects — stale-positive
/// windows shrink as a token's validity runs out, rather than staying flat.
pub const MIN_REMAINING_LIFETIME: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct IntrospectionConfig {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IntrospectionResult {
    pub active: bool,
    #[serde(rename = "sub")]
    pub external_user_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// Unix timestamp the token expires at.
    pub exp: i64,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl IntrospectionResult {
    fn remaining_lifetime(&self) -> Duration {
        let now = Utc::now().timestamp();
        Duration::from_secs((self.exp - now).max(0) as u64)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct TokenHash([u8; 32]);

fn hash_token(token: &str) -> TokenHash {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    TokenHash(hasher.finalize().into())
}

pub struct IdentityVerifier {
    http: reqwest::Client,
    config: IntrospectionConfig,
    cache: pos_cache::TtlCache<TokenHash, IntrospectionResult>,
}

impl IdentityVerifier {
    pub fn new(config: IntrospectionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            cache: pos_cache::TtlCache::new(MAX_CACHE_TTL),
        }
    }

    /// Verify a bearer token, consulting the cache first unless the token is
    /// close enough to expiry that a cached answer could go stale mid-use.
    pub async fn verify(&self, token: &str) -> Result<IntrospectionResult, SecurityError> {
        if token.is_empty() {
            return Err(SecurityError::TokenRejected("empty token".into()));
        }

        let key = hash_token(token);
        if let Some(cached) = self.cache.get(&key) {
            if cached.remaining_lifetime() >= MIN_REMAINING_LIFETIME {
                return Ok(cached);
            }
        }

        let result = self.introspect_remote(token).await?;

        if !result.active {
            return Err(SecurityError::TokenRejected("token not active".into()));
        }
        if result.remaining_lifetime().is_zero() {
            return Err(SecurityError::TokenExpired);
        }

        let ttl = MAX_CACHE_TTL.min(result.remaining_lifetime());
        if ttl >= MIN_REMAINING_LIFETIME {
            self.cache.insert_with_ttl(key, result.clone(), ttl);
        }

        Ok(result)
    }

    async fn introspect_remote(&self, token: &str) -> Result<IntrospectionResult, SecurityError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| SecurityError::IntrospectionUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SecurityError::IntrospectionUnavailable(format!(
                "identity provider returned {}",
                response.status()
            )));
        }

        response
            .json::<IntrospectionResult>()
            .await
            .map_err(|e| SecurityError::IntrospectionUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(exp_offset_secs: i64, active: bool) -> IntrospectionResult {
        IntrospectionResult {
            active,
            external_user_id: "user-1".into(),
            email: Some("a@b.com".into()),
            email_verified: true,
            exp: Utc::now().timestamp() + exp_offset_secs,
            tenant_id: Some("tenant-1".into()),
            roles: vec!["cashier".into()],
        }
    }

    #[test]
    fn remaining_lifetime_clamps_to_zero_for_expired_tokens() {
        let result = sample(-30, true);
        assert_eq!(result.remaining_lifetime(), Duration::ZERO);
    }

    #[test]
    fn remaining_lifetime_reflects_exp() {
        let result = sample(120, true);
        let remaining = result.remaining_lifetime();
        assert!(remaining.as_secs() >= 115 && remaining.as_secs() <= 120);
    }

    #[tokio::test]
    async fn empty_token_rejected_without_remote_call() {
        let verifier = IdentityVerifier::new(IntrospectionConfig {
            endpoint: "http://127.0.0.1:1/introspect".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
        });
        let err = verifier.verify("").await.unwrap_err();
        assert!(matches!(err, SecurityError::TokenRejected(_)));
    }

    #[test]
    fn cache_key_is_stable_and_does_not_leak_the_token() {
        let a = hash_token("secret-token-value");
        let b = hash_token("secret-token-value");
        let c = hash_token("different-token-value");
        assert!(a == b);
        assert!(a != c);
    }
}
