//! Application configuration, loaded via [`pos_core::config::ConfigLoader`]
//! (YAML base + profile override + `APP__SECTION__KEY` env overrides).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub platform_owner_allowlist: Vec<String>,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    #[serde(default = "default_metrics_bind_addr")]
    pub metrics_bind_addr: String,
}

fn default_metrics_bind_addr() -> String {
    "127.0.0.1:9090".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub introspection_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub provider_fee_bps: i32,
    pub platform_fee_bps: i32,
    pub qr: ProviderConfig,
    pub sumup: ProviderConfig,
    pub stripe: ProviderConfig,
    pub apple_pay: ProviderConfig,
    /// Restaurant ids, each mapped to the providers they've disabled.
    #[serde(default)]
    pub disabled_providers: std::collections::HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub webhook_secret: String,
}

impl PaymentsConfig {
    pub fn provider_config(&self, kind: pos_payments::model::ProviderKind) -> &ProviderConfig {
        use pos_payments::model::ProviderKind::*;
        match kind {
            Qr => &self.qr,
            SumUp => &self.sumup,
            Stripe => &self.stripe,
            ApplePay => &self.apple_pay,
        }
    }
}

impl From<&DatabaseConfig> for pos_db::pool::DatabaseConfig {
    fn from(c: &DatabaseConfig) -> Self {
        pos_db::pool::DatabaseConfig {
            url: c.url.clone(),
            max_connections: c.max_connections,
            acquire_timeout_secs: c.acquire_timeout_secs,
        }
    }
}
