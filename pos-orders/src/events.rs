//! Domain events the order engine emits. The real-time hub subscribes to
//! these through the shared event bus and fans them out to the
//! `restaurant:{id}` room; `seq` lets a connection detect gaps across a
//! brief disconnect even though delivery itself is at-most-once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub restaurant_id: String,
    pub order_id: uuid::Uuid,
    pub order_number: i64,
    pub seq: i64,
    pub kind: OrderEventKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Confirmed,
    StatusChanged { from: OrderStatus, to: OrderStatus },
    Cancelled,
}

impl OrderEvent {
    pub fn topic(&self) -> &'static str {
        match self.kind {
            OrderEventKind::Confirmed => "order.confirmed",
            OrderEventKind::StatusChanged { .. } => "order.status_changed",
            OrderEventKind::Cancelled => "order.cancelled",
        }
    }
}
