//! Prometheus metrics, served on a separate loopback-only listener so the
//! public API surface never exposes operational internals.

use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            prometheus::Opts::new("http_requests_total", "Total HTTP requests handled"),
            &["method", "path", "status"],
        )
        .expect("metric names and labels are static and valid");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric registered exactly once");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "path"],
        )
        .expect("metric names and labels are static and valid");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric registered exactly once");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
        }
    }

    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .expect("encoding a gathered metric family never fails");
        String::from_utf8(buf).expect("prometheus text encoding is always valid utf-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<std::sync::Arc<Metrics>>,
) -> impl axum::response::IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.gather(),
    )
}
