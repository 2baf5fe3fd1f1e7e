//! Tenant-scoped transactions.
//!
//! Every transaction that touches tenant-owned tables is opened through
//! [`begin_tenant_scoped`], which sets five session-local GUCs before handing
//! the transaction back: `app.current_user_id`, `app.current_user_email`,
//! `app.current_user_role`, `app.current_restaurant_id`, and
//! `app.is_platform_owner`. Every tenant-owned table's row-level-security
//! policy reads those GUCs via `current_setting`, so a query that forgets a
//! `WHERE restaurant_id = ...` clause still can't see another tenant's rows —
//! the database enforces it, not the query author.
//!
//! `SET LOCAL` is scoped to the transaction and reset automatically on
//! commit or rollback, so there is no risk of a pooled connection leaking
//! one request's tenant into the next.

use std::ops::{Deref, DerefMut};

use pos_security::tenant::TenantContext;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::DbError;

pub struct Tx<'a> {
    inner: Transaction<'a, Postgres>,
    committed: bool,
}

impl<'a> Tx<'a> {
    pub fn as_mut(&mut self) -> &mut Transaction<'a, Postgres> {
        &mut self.inner
    }

    pub async fn commit(mut self) -> Result<(), DbError> {
        self.committed = true;
        let inner = std::mem::replace(&mut self.inner, unreachable_transaction());
        inner.commit().await?;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), DbError> {
        self.committed = true; // prevents the Drop impl from trying again
        let inner = std::mem::replace(&mut self.inner, unreachable_transaction());
        inner.rollback().await?;
        Ok(())
    }
}

// sqlx::Transaction rolls back on drop by default; this placeholder is never
// awaited because commit()/rollback() always move the real transaction out
// before it would otherwise be touched again.
fn unreachable_transaction<'a>() -> Transaction<'a, Postgres> {
    panic!("Tx used after commit or rollback")
}

impl<'a> Deref for Tx<'a> {
    type Target = Transaction<'a, Postgres>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a> DerefMut for Tx<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Begins a transaction and sets the row-level-security GUCs for `ctx`.
///
/// Uses `set_config(..., true)` (the `true` means "local to this
/// transaction") with bound parameters, rather than string-formatted
/// `SET LOCAL`, so a tenant id can never be interpreted as SQL.
pub async fn begin_tenant_scoped<'a>(pool: &'a PgPool, ctx: &TenantContext) -> Result<Tx<'a>, DbError> {
    let mut inner = pool.begin().await?;
    sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
        .bind(&ctx.user_id)
        .execute(&mut *inner)
        .await?;
    sqlx::query("SELECT set_config('app.current_user_email', $1, true)")
        .bind(ctx.email.as_deref().unwrap_or(""))
        .execute(&mut *inner)
        .await?;
    sqlx::query("SELECT set_config('app.current_user_role', $1, true)")
        .bind(ctx.primary_role())
        .execute(&mut *inner)
        .await?;
    sqlx::query("SELECT set_config('app.current_restaurant_id', $1, true)")
        .bind(&ctx.tenant_id)
        .execute(&mut *inner)
        .await?;
    sqlx::query("SELECT set_config('app.is_platform_owner', $1, true)")
        .bind(if ctx.is_platform_owner { "true" } else { "false" })
        .execute(&mut *inner)
        .await?;
    Ok(Tx {
        inner,
        committed: false,
    })
}

#[cfg(test)]
mod tests {
    // `begin_tenant_scoped` requires a live Postgres connection; integration
    // coverage lives alongside the order/payment engines' own test suites,
    // which run against a transaction opened this way. This module only
    // checks the pieces that don't need a database.
    use super::*;

    #[test]
    fn tx_type_is_not_sync_by_accident() {
        fn assert_send<T: Send>() {}
        assert_send::<Tx<'static>>();
    }
}
