pub mod menu;
pub mod orders;
pub mod payments;
pub mod platform;
pub mod restaurants;

use std::time::Duration;

use tower::timeout::TimeoutLayer;

use pos_core::http::{get, patch, post, Router};

use crate::state::AppState;

/// Payment-provider round trips get a tighter deadline than the default;
/// a slow provider shouldn't be able to hold a connection for the full 30s.
const PAYMENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const WEBHOOK_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/auth/verify", post(crate::auth::verify_handler))
        .route("/restaurants", post(restaurants::create_restaurant))
        .route("/restaurants/{id}", get(restaurants::get_restaurant))
        .route("/restaurants/{id}/menu", get(menu::get_menu))
        .route("/restaurants/{id}/orders", post(orders::create_order).get(orders::list_orders))
        .route("/restaurants/{id}/orders/{order_id}", get(orders::get_order))
        .route("/restaurants/{id}/orders/{order_id}/lines", patch(orders::update_lines))
        .route("/restaurants/{id}/orders/{order_id}/confirm", post(orders::confirm_order))
        .route("/restaurants/{id}/orders/{order_id}/advance", post(orders::advance_order))
        .route("/restaurants/{id}/orders/{order_id}/cancel", post(orders::cancel_order))
        .route(
            "/restaurants/{id}/payments/{method}/intents",
            post(payments::create_intent).route_layer(TimeoutLayer::new(PAYMENT_REQUEST_TIMEOUT)),
        )
        .route(
            "/restaurants/{id}/payments/{payment_id}/refund",
            post(payments::refund).route_layer(TimeoutLayer::new(PAYMENT_REQUEST_TIMEOUT)),
        )
        .route(
            "/payments/webhook/{provider}",
            post(payments::webhook).route_layer(TimeoutLayer::new(WEBHOOK_REQUEST_TIMEOUT)),
        )
        .route("/platform/restaurants", get(platform::list_restaurants))
}
