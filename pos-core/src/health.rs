//! Health reporting.
//!
//! `/health` always answers `200 OK`; the body's `status` field distinguishes
//! a fully healthy instance from a degraded one serving on a failing
//! dependency. Infrastructure probes that key off HTTP status alone (rather
//! than parsing the body) should hit `/health/ready` instead, which does
//! return `503` when a readiness check fails — that's the one orchestrators
//! should use to pull an instance out of rotation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Up,
    Down(String),
}

/// A single named dependency check (e.g. "database", "identity_provider").
pub trait HealthIndicator: Send + Sync {
    fn name(&self) -> &'static str;
    /// Whether this check should also gate readiness (pull the instance out
    /// of load-balancer rotation), as opposed to being informational only.
    fn affects_readiness(&self) -> bool {
        true
    }
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>>;
}

#[derive(Clone, Serialize)]
pub struct HealthCheckStatus {
    pub name: &'static str,
    pub status: HealthStatus,
}

#[derive(Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub uptime_secs: u64,
    pub checks: Vec<HealthCheckStatus>,
}

struct CachedResponse {
    response: HealthResponse,
    computed_at: Instant,
}

pub struct HealthState {
    checks: Vec<Arc<dyn HealthIndicator>>,
    start_time: Instant,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedResponse>>,
}

impl HealthState {
    pub fn new(checks: Vec<Arc<dyn HealthIndicator>>, cache_ttl: Duration) -> Self {
        Self {
            checks,
            start_time: Instant::now(),
            cache_ttl,
            cache: RwLock::new(None),
        }
    }

    async fn aggregate(&self) -> HealthResponse {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.computed_at.elapsed() < self.cache_ttl {
                return cached.response.clone();
            }
        }

        let mut checks = Vec::with_capacity(self.checks.len());
        let mut overall_down: Option<String> = None;
        for indicator in &self.checks {
            let status = indicator.check().await;
            if let HealthStatus::Down(ref reason) = status {
                overall_down.get_or_insert_with(|| format!("{}: {reason}", indicator.name()));
            }
            checks.push(HealthCheckStatus {
                name: indicator.name(),
                status,
            });
        }

        let response = HealthResponse {
            status: match overall_down {
                Some(reason) => HealthStatus::Down(reason),
                None => HealthStatus::Up,
            },
            uptime_secs: self.start_time.elapsed().as_secs(),
            checks,
        };

        *self.cache.write().await = Some(CachedResponse {
            response: response.clone(),
            computed_at: Instant::now(),
        });
        response
    }

    async fn aggregate_readiness(&self) -> bool {
        let response = self.aggregate().await;
        response
            .checks
            .iter()
            .zip(self.checks.iter())
            .filter(|(_, indicator)| indicator.affects_readiness())
            .all(|(check, _)| matches!(check.status, HealthStatus::Up))
    }
}

/// `GET /health` — always 200. Consumers should read `status` in the body.
pub async fn health_handler(State(health): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = health.aggregate().await;
    (StatusCode::OK, Json(response))
}

/// `GET /health/live` — process is up and accepting connections. Always 200;
/// never depends on downstream services, so a flaky dependency can't cause
/// the orchestrator to kill and restart an otherwise-healthy process.
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// `GET /health/ready` — 200 only if every readiness-affecting check passes.
/// Orchestrators use this (not `/health`) to decide whether to route traffic.
pub async fn readiness_handler(State(health): State<Arc<HealthState>>) -> impl IntoResponse {
    if health.aggregate_readiness().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUp;
    impl HealthIndicator for AlwaysUp {
        fn name(&self) -> &'static str {
            "always_up"
        }
        fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
            Box::pin(async { HealthStatus::Up })
        }
    }

    struct AlwaysDown;
    impl HealthIndicator for AlwaysDown {
        fn name(&self) -> &'static str {
            "always_down"
        }
        fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
            Box::pin(async { HealthStatus::Down("simulated failure".into()) })
        }
    }

    #[tokio::test]
    async fn healthy_when_all_checks_pass() {
        let state = HealthState::new(vec![Arc::new(AlwaysUp)], Duration::from_secs(0));
        let response = state.aggregate().await;
        assert_eq!(response.status, HealthStatus::Up);
    }

    #[tokio::test]
    async fn degraded_status_reported_but_readiness_fails() {
        let state = HealthState::new(vec![Arc::new(AlwaysDown)], Duration::from_secs(0));
        let response = state.aggregate().await;
        assert!(matches!(response.status, HealthStatus::Down(_)));
        assert!(!state.aggregate_readiness().await);
    }

    #[tokio::test]
    async fn informational_check_does_not_affect_readiness() {
        struct InformationalDown;
        impl HealthIndicator for InformationalDown {
            fn name(&self) -> &'static str {
                "informational"
            }
            fn affects_readiness(&self) -> bool {
                false
            }
            fn check(&self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + '_>> {
                Box::pin(async { HealthStatus::Down("noncritical".into()) })
            }
        }
        let state = HealthState::new(vec![Arc::new(InformationalDown)], Duration::from_secs(0));
        assert!(state.aggregate_readiness().await);
    }
}
