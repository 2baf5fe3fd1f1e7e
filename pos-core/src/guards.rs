//! Authorization primitives: an [`Identity`] abstraction over "whoever is
//! making this request", and a [`Guard`] trait for per-handler checks that
//! run after identity has been established.

use axum::http::{HeaderMap, Uri};
use std::future::Future;

/// Anything that can answer "who is this and what can they do".
///
/// Implemented once by the platform's real identity type (built from an
/// introspected token) and by test doubles.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Identity`",
    label = "this type cannot be used as an authenticated principal",
    note = "implement `Identity` for your type, or use `AuthenticatedUser`"
)]
pub trait Identity: Send + Sync + 'static {
    fn subject(&self) -> &str;
    fn roles(&self) -> &[String];
    fn tenant_id(&self) -> Option<&str>;

    fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }
}

/// Sentinel identity for routes that don't require authentication.
pub struct NoIdentity;

impl Identity for NoIdentity {
    fn subject(&self) -> &str {
        "anonymous"
    }
    fn roles(&self) -> &[String] {
        &[]
    }
    fn tenant_id(&self) -> Option<&str> {
        None
    }
}

/// Path parameters available to a guard, independent of any particular
/// extractor so guards don't need to know the route's exact parameter type.
pub enum PathParams<'a> {
    Pairs(&'a [(String, String)]),
}

impl<'a> PathParams<'a> {
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            PathParams::Pairs(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }
}

/// Everything a [`Guard`] needs to make a decision.
pub struct GuardContext<'a, I> {
    pub method_name: &'static str,
    pub route_name: &'static str,
    pub headers: &'a HeaderMap,
    pub uri: &'a Uri,
    pub path_params: PathParams<'a>,
    pub identity: &'a I,
}

/// A per-handler authorization check that runs once an [`Identity`] has been
/// extracted (post-authentication). Returning `Err` rejects the request.
pub trait Guard<S, I>: Send + Sync {
    fn check(&self, ctx: &GuardContext<'_, I>, state: &S) -> impl Future<Output = Result<(), crate::error::AppError>> + Send;
}

/// A guard that runs before identity extraction — used for checks that must
/// happen even on anonymous/public routes (e.g. IP-based rate limiting).
pub struct PreAuthGuardContext<'a> {
    pub method_name: &'static str,
    pub route_name: &'static str,
    pub headers: &'a HeaderMap,
    pub uri: &'a Uri,
}

pub trait PreAuthGuard<S>: Send + Sync {
    fn check(&self, ctx: &PreAuthGuardContext<'_>, state: &S) -> impl Future<Output = Result<(), crate::error::AppError>> + Send;
}

/// A guard requiring the identity to hold at least one of a fixed role set.
pub struct RolesGuard {
    pub required_roles: Vec<String>,
}

impl RolesGuard {
    pub fn any_of(roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required_roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S, I> Guard<S, I> for RolesGuard
where
    S: Send + Sync,
    I: Identity,
{
    async fn check(&self, ctx: &GuardContext<'_, I>, _state: &S) -> Result<(), crate::error::AppError> {
        if self
            .required_roles
            .iter()
            .any(|r| ctx.identity.has_role(r))
        {
            Ok(())
        } else {
            Err(crate::error::AppError::forbidden_with_code(
                "role_insufficient",
                "insufficient role",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestIdentity {
        roles: Vec<String>,
    }

    impl Identity for TestIdentity {
        fn subject(&self) -> &str {
            "u1"
        }
        fn roles(&self) -> &[String] {
            &self.roles
        }
        fn tenant_id(&self) -> Option<&str> {
            Some("t1")
        }
    }

    #[tokio::test]
    async fn roles_guard_allows_matching_role() {
        let identity = TestIdentity {
            roles: vec!["manager".into()],
        };
        let headers = HeaderMap::new();
        let uri: Uri = "/x".parse().unwrap();
        let ctx = GuardContext {
            method_name: "m",
            route_name: "r",
            headers: &headers,
            uri: &uri,
            path_params: PathParams::Pairs(&[]),
            identity: &identity,
        };
        let guard = RolesGuard::any_of(["manager", "owner"]);
        let result: Result<(), crate::error::AppError> = guard.check(&ctx, &()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn roles_guard_rejects_missing_role() {
        let identity = TestIdentity {
            roles: vec!["cashier".into()],
        };
        let headers = HeaderMap::new();
        let uri: Uri = "/x".parse().unwrap();
        let ctx = GuardContext {
            method_name: "m",
            route_name: "r",
            headers: &headers,
            uri: &uri,
            path_params: PathParams::Pairs(&[]),
            identity: &identity,
        };
        let guard = RolesGuard::any_of(["manager"]);
        let result: Result<(), crate::error::AppError> = guard.check(&ctx, &()).await;
        assert!(matches!(result, Err(crate::error::AppError::Forbidden { .. })));
    }
}
