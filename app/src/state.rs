//! Shared application state, handed to every handler through axum's `State`
//! extractor. `Arc<HealthState>` and `Arc<HubState>` get their own
//! [`axum::extract::FromRef`] impls so the pre-built health and WebSocket
//! handlers (`pos_core::health`, `pos_realtime::hub`) mount directly onto
//! this crate's router without modification.

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use pos_core::health::HealthState;
use pos_events::LocalEventBus;
use pos_menu::MenuService;
use pos_orders::engine::OrderEngine;
use pos_payments::engine::PaymentOrchestrator;
use pos_realtime::hub::HubState;
use pos_security::introspection::IdentityVerifier;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub identity_verifier: Arc<IdentityVerifier>,
    pub menu: Arc<MenuService>,
    pub orders: Arc<OrderEngine<LocalEventBus>>,
    pub payments: Arc<PaymentOrchestrator<LocalEventBus>>,
    pub health: Arc<HealthState>,
    pub hub: Arc<HubState>,
}

impl FromRef<AppState> for Arc<HealthState> {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

impl FromRef<AppState> for Arc<HubState> {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}
