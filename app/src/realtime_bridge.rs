//! Wires order/payment domain events into the WebSocket hub's rooms.
//!
//! `OrderEngine`/`PaymentOrchestrator` only call `bus.emit_and_wait`; nothing
//! reaches a connected client unless something has subscribed. This module
//! is that subscriber, registered once at startup before either engine's
//! `publish` is ever called.

use std::sync::Arc;

use pos_events::{EventBus, LocalEventBus};
use pos_orders::events::OrderEvent;
use pos_payments::events::PaymentEvent;
use pos_realtime::rooms::{restaurant_room, RoomMessage, WsRooms};

pub async fn install(bus: &LocalEventBus, rooms: WsRooms) {
    let order_rooms = rooms.clone();
    bus.subscribe::<OrderEvent, _, _>(move |event: Arc<OrderEvent>| {
        let rooms = order_rooms.clone();
        async move { publish_order_event(&rooms, &event) }
    })
    .await;

    let payment_rooms = rooms;
    bus.subscribe::<PaymentEvent, _, _>(move |event: Arc<PaymentEvent>| {
        let rooms = payment_rooms.clone();
        async move { publish_payment_event(&rooms, &event) }
    })
    .await;
}

fn publish_order_event(rooms: &WsRooms, event: &OrderEvent) {
    let payload = match serde_json::to_value(event) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize order event for broadcast");
            return;
        }
    };
    rooms.room(&restaurant_room(&event.restaurant_id)).publish(RoomMessage {
        topic: event.topic().to_string(),
        payload,
    });
}

fn publish_payment_event(rooms: &WsRooms, event: &PaymentEvent) {
    let payload = match serde_json::to_value(event) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize payment event for broadcast");
            return;
        }
    };
    rooms.room(&restaurant_room(&event.restaurant_id)).publish(RoomMessage {
        topic: event.topic().to_string(),
        payload,
    });
}
