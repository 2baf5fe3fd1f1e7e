//! Room registry: named broadcast channels identified by `restaurant:{id}`
//! or `user:{id}`. Every connection joins both its restaurant's room (to
//! receive order/payment/kitchen updates for that tenant) and its own user
//! room (for direct notifications).

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Clone, Serialize)]
pub struct RoomMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct WsBroadcaster {
    tx: broadcast::Sender<Arc<RoomMessage>>,
}

impl WsBroadcaster {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, message: RoomMessage) {
        // No receivers is the common case between restaurants with nobody
        // currently watching; `send` erroring just means that.
        let _ = self.tx.send(Arc::new(message));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomMessage>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub fn restaurant_room(tenant_id: &str) -> String {
    format!("restaurant:{tenant_id}")
}

pub fn user_room(user_id: &str) -> String {
    format!("user:{user_id}")
}

#[derive(Clone)]
pub struct WsRooms {
    rooms: Arc<DashMap<String, WsBroadcaster>>,
    capacity_per_room: usize,
}

impl WsRooms {
    pub fn new(capacity_per_room: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity_per_room,
        }
    }

    pub fn room(&self, name: &str) -> WsBroadcaster {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| WsBroadcaster::new(self.capacity_per_room))
            .clone()
    }

    /// Drops a room once nobody is subscribed, so restaurants/users that
    /// haven't had a connection in a while don't accumulate empty channels.
    pub fn evict_if_empty(&self, name: &str) {
        self.rooms.remove_if(name, |_, broadcaster| broadcaster.subscriber_count() == 0);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_published_to_a_room_reach_its_subscribers() {
        let rooms = WsRooms::new(16);
        let broadcaster = rooms.room(&restaurant_room("tenant-1"));
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(RoomMessage {
            topic: "order.status".into(),
            payload: serde_json::json!({"order_id": "o1"}),
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "order.status");
    }

    #[tokio::test]
    async fn rooms_are_independent() {
        let rooms = WsRooms::new(16);
        let a = rooms.room(&restaurant_room("a"));
        let b = rooms.room(&restaurant_room("b"));
        let mut rx_b = b.subscribe();
        a.publish(RoomMessage {
            topic: "order.status".into(),
            payload: serde_json::json!({}),
        });
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_room_is_evicted() {
        let rooms = WsRooms::new(16);
        {
            let broadcaster = rooms.room("r1");
            let _rx = broadcaster.subscribe();
            assert_eq!(rooms.room_count(), 1);
        }
        rooms.evict_if_empty("r1");
        assert_eq!(rooms.room_count(), 0);
    }
}
