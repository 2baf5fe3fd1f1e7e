use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
        // Recycle connections hourly so long-lived ones don't outlive a
        // load balancer's idea of the backend, and probe with a cheap query
        // before handing a pooled connection back out rather than finding
        // out it went stale mid-request.
        .max_lifetime(std::time::Duration::from_secs(3600))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
}
