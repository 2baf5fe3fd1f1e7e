//! Tenant context: the piece of request state that row-level security is
//! built from. Every repository call that touches tenant-owned data takes a
//! `&TenantContext` and threads it into the transaction that sets the
//! database session's row-level-security variable (see `pos_db::tx`).

use crate::error::SecurityError;
use crate::identity::AuthenticatedUser;

#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    /// Platform owners (an explicit config allowlist, never role-derived)
    /// may act across tenants — used by internal tooling/support only.
    pub is_platform_owner: bool,
}

impl TenantContext {
    /// Builds a tenant context from a verified identity. Fails if the token
    /// carries no tenant claim at all — there is no "acting with no tenant"
    /// mode short of the explicit platform-owner allowlist.
    ///
    /// The platform-owner allowlist is configured as emails, not external
    /// user ids, so elevation is matched against `user.email`.
    pub fn from_identity(
        user: &AuthenticatedUser,
        platform_owner_allowlist: &[String],
    ) -> Result<Self, SecurityError> {
        let tenant_id = user
            .tenant_id
            .clone()
            .ok_or_else(|| SecurityError::TokenRejected("token carries no tenant claim".into()))?;
        let is_platform_owner = user
            .email
            .as_deref()
            .map(|email| platform_owner_allowlist.iter().any(|allowed| allowed == email))
            .unwrap_or(false);
        Ok(Self {
            tenant_id,
            user_id: user.external_user_id.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
            is_platform_owner,
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// The role bound into the database session's `current_user_role`
    /// variable. Identity tokens carry a role set for authorization checks,
    /// but row-level security binds a single value; the first role is the
    /// acting role for that purpose.
    pub fn primary_role(&self) -> &str {
        self.roles.first().map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(tenant_id: Option<&str>) -> AuthenticatedUser {
        AuthenticatedUser {
            external_user_id: "user-1".into(),
            email: Some("user-1@example.com".into()),
            email_verified: false,
            tenant_id: tenant_id.map(str::to_string),
            roles: vec!["cashier".into()],
        }
    }

    #[test]
    fn builds_context_from_tenant_claim() {
        let ctx = TenantContext::from_identity(&user(Some("tenant-a")), &[]).unwrap();
        assert_eq!(ctx.tenant_id, "tenant-a");
        assert!(!ctx.is_platform_owner);
    }

    #[test]
    fn rejects_tokens_without_a_tenant_claim() {
        let err = TenantContext::from_identity(&user(None), &[]).unwrap_err();
        assert!(matches!(err, SecurityError::TokenRejected(_)));
    }

    #[test]
    fn recognizes_platform_owner_allowlist_by_email() {
        let ctx = TenantContext::from_identity(
            &user(Some("tenant-a")),
            &["user-1@example.com".into()],
        )
        .unwrap();
        assert!(ctx.is_platform_owner);
    }

    #[test]
    fn does_not_elevate_on_external_user_id_match() {
        let ctx = TenantContext::from_identity(&user(Some("tenant-a")), &["user-1".into()]).unwrap();
        assert!(!ctx.is_platform_owner);
    }
}
