//! Menu read cache.
//!
//! The menu changes rarely compared to how often it's read (every POS
//! terminal polls it), so reads are served from an in-memory cache keyed by
//! `tenant_id`, invalidated by comparing against the tenant's current
//! `catalog_version` rather than a time-based TTL alone. If the database is
//! unreachable, a cached-but-stale menu is served with `CacheStatus::Bypass`
//! rather than failing the request outright — the HTTP layer turns that into
//! an `X-Cache: bypass` response header so operators can see degraded mode
//! without it being a hard error for the terminal.

use std::sync::Arc;
use std::time::Duration;

use pos_cache::TtlCache;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Clone, Serialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    /// Decimal string with two fractional digits (`"18.00"`), not a plain
    /// number — terminals render it verbatim rather than formatting cents.
    pub price: String,
    pub category: String,
    pub available: bool,
    pub emoji: String,
}

fn format_price_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents.rem_euclid(100))
}

#[derive(Clone, Serialize)]
pub struct Menu {
    pub catalog_version: i64,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// The database couldn't be reached; a previously cached menu (possibly
    /// stale relative to the true current catalog_version) was served.
    Bypass,
}

#[derive(Debug)]
pub enum MenuError {
    Unavailable(String),
}

impl std::fmt::Display for MenuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuError::Unavailable(m) => write!(f, "menu unavailable: {m}"),
        }
    }
}

impl std::error::Error for MenuError {}

impl From<MenuError> for pos_core::AppError {
    fn from(err: MenuError) -> Self {
        pos_core::AppError::unavailable(err.to_string())
    }
}

#[derive(Clone)]
struct CachedMenu {
    menu: Arc<Menu>,
}

pub struct MenuService {
    pool: PgPool,
    cache: TtlCache<String, CachedMenu>,
}

impl MenuService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            // Safety-net TTL; normal invalidation is version-based and
            // happens on every read via `current_catalog_version`.
            cache: TtlCache::new(Duration::from_secs(300)),
        }
    }

    pub async fn get_menu(&self, tenant_id: &str) -> Result<(Arc<Menu>, CacheStatus), MenuError> {
        let live_version = self.current_catalog_version(tenant_id).await;

        match live_version {
            Ok(version) => {
                if let Some(cached) = self.cache.get(&tenant_id.to_string()) {
                    if cached.menu.catalog_version == version {
                        return Ok((cached.menu.clone(), CacheStatus::Hit));
                    }
                }
                let menu = Arc::new(self.load_menu(tenant_id, version).await?);
                self.cache.insert(
                    tenant_id.to_string(),
                    CachedMenu { menu: menu.clone() },
                );
                Ok((menu, CacheStatus::Miss))
            }
            Err(e) => {
                if let Some(cached) = self.cache.get(&tenant_id.to_string()) {
                    tracing::warn!(tenant_id, error = %e, "serving stale menu: catalog version check failed");
                    Ok((cached.menu.clone(), CacheStatus::Bypass))
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Invalidates a tenant's cached menu immediately, used when an admin
    /// publishes a catalog change rather than waiting for the next read to
    /// notice the version bumped.
    pub fn invalidate(&self, tenant_id: &str) {
        self.cache.remove(&tenant_id.to_string());
    }

    async fn current_catalog_version(&self, tenant_id: &str) -> Result<i64, MenuError> {
        sqlx::query_scalar::<_, i64>("SELECT catalog_version FROM restaurants WHERE id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MenuError::Unavailable(e.to_string()))
    }

    async fn load_menu(&self, tenant_id: &str, catalog_version: i64) -> Result<Menu, MenuError> {
        let rows = sqlx::query_as::<_, (String, String, i64, String, bool, String)>(
            "SELECT id, name, price_cents, category, available, emoji \
             FROM menu_items WHERE restaurant_id = $1 ORDER BY category, name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MenuError::Unavailable(e.to_string()))?;

        Ok(Menu {
            catalog_version,
            items: rows
                .into_iter()
                .map(|(id, name, price_cents, category, available, emoji)| MenuItem {
                    id,
                    name,
                    price: format_price_cents(price_cents),
                    category,
                    available,
                    emoji,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_status_distinguishes_hit_miss_bypass() {
        assert_ne!(CacheStatus::Hit, CacheStatus::Miss);
        assert_ne!(CacheStatus::Miss, CacheStatus::Bypass);
    }
}
