mod auth;
mod config;
mod metrics;
mod realtime_bridge;
mod routes;
mod state;
mod validation;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use pos_core::config::ConfigLoader;
use pos_core::health::{HealthIndicator, HealthState, HealthStatus};
use pos_events::LocalEventBus;
use pos_menu::MenuService;
use pos_orders::engine::OrderEngine;
use pos_payments::engine::PaymentOrchestrator;
use pos_payments::fees::FeeRates;
use pos_payments::providers::{build_providers, HttpProviderConfig};
use pos_realtime::hub::HubState;
use pos_security::introspection::{IdentityVerifier, IntrospectionConfig};

use crate::config::AppConfig;
use crate::state::AppState;

/// Default request deadline; payment-provider calls and webhook ingestion
/// get tighter ones applied directly on their routes in `routes::api_router`.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct DatabaseHealth {
    pool: sqlx::PgPool,
}

impl HealthIndicator for DatabaseHealth {
    fn name(&self) -> &'static str {
        "database"
    }

    fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
        Box::pin(async move {
            match sqlx::query("SELECT 1").execute(&self.pool).await {
                Ok(_) => HealthStatus::Up,
                Err(e) => HealthStatus::Down(e.to_string()),
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::fmt()
        .json()
        .with_target(true)
        .with_env_filter(env_filter)
        .init();

    let config: AppConfig = ConfigLoader::new().load()?;
    let config = Arc::new(config);

    let pool = pos_db::pool::connect(&(&config.database).into()).await?;

    let bus = LocalEventBus::new();

    let hub = Arc::new(HubState::new(
        Arc::new(IdentityVerifier::new(IntrospectionConfig {
            endpoint: config.identity.introspection_endpoint.clone(),
            client_id: config.identity.client_id.clone(),
            client_secret: config.identity.client_secret.clone(),
        })),
        config.platform_owner_allowlist.clone(),
    ));
    realtime_bridge::install(&bus, hub.rooms.clone()).await;

    let identity_verifier = hub.identity_verifier.clone();
    let menu = Arc::new(MenuService::new(pool.clone()));
    let orders = Arc::new(OrderEngine::new(bus.clone()));

    let http_client = reqwest::Client::new();
    let providers = build_providers(
        http_client,
        [
            (
                pos_payments::model::ProviderKind::Qr,
                provider_config(&config.payments.qr),
            ),
            (
                pos_payments::model::ProviderKind::SumUp,
                provider_config(&config.payments.sumup),
            ),
            (
                pos_payments::model::ProviderKind::Stripe,
                provider_config(&config.payments.stripe),
            ),
            (
                pos_payments::model::ProviderKind::ApplePay,
                provider_config(&config.payments.apple_pay),
            ),
        ],
    );
    let fee_rates = FeeRates {
        provider_fee_bps: config.payments.provider_fee_bps,
        platform_fee_bps: config.payments.platform_fee_bps,
    };
    let disabled_providers = config.payments.disabled_providers.clone();
    let payments = Arc::new(PaymentOrchestrator::new(
        providers,
        move |restaurant_id: &str, kind: pos_payments::model::ProviderKind| {
            disabled_providers
                .get(restaurant_id)
                .is_some_and(|disabled| disabled.iter().any(|p| p == kind.as_str()))
        },
        fee_rates,
        bus.clone(),
    ));

    let health = Arc::new(HealthState::new(
        vec![Arc::new(DatabaseHealth { pool: pool.clone() })],
        Duration::from_secs(5),
    ));

    let state = AppState {
        config: config.clone(),
        pool,
        identity_verifier,
        menu,
        orders,
        payments,
        health,
        hub: hub.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok()),
        ))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = pos_core::http::Router::new()
        .nest("/api/v1", routes::api_router())
        .route("/health", pos_core::http::get(pos_core::health::health_handler))
        .route("/health/live", pos_core::http::get(pos_core::health::liveness_handler))
        .route("/health/ready", pos_core::http::get(pos_core::health::readiness_handler))
        .route("/ws", pos_core::http::get(pos_realtime::hub::ws_handler))
        .layer(tower::timeout::TimeoutLayer::new(DEFAULT_REQUEST_TIMEOUT))
        .layer(axum::middleware::from_fn(pos_core::secure_headers::secure_headers))
        .layer(axum::middleware::from_fn(pos_core::request_id::propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let metrics = Arc::new(metrics::Metrics::new());
    let metrics_app = pos_core::http::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(metrics);

    let metrics_listener = tokio::net::TcpListener::bind(&config.server.metrics_bind_addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            tracing::error!(error = %e, "metrics listener exited");
        }
    });

    tracing::info!(bind_addr = %config.server.bind_addr, "starting pos-app");
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn provider_config(cfg: &crate::config::ProviderConfig) -> HttpProviderConfig {
    HttpProviderConfig {
        base_url: cfg.base_url.clone(),
        api_key: cfg.api_key.clone(),
        webhook_secret: cfg.webhook_secret.clone(),
    }
}
