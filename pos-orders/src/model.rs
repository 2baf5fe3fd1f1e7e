use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "draft" => OrderStatus::Draft,
            "confirmed" => OrderStatus::Confirmed,
            "preparing" => OrderStatus::Preparing,
            "ready" => OrderStatus::Ready,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            _ => return None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Whether `self -> target` is a legal state machine step. `Completed ->
    /// Refunded` is the only transition allowed out of a terminal state,
    /// modelling a full refund against an already-completed order.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Draft, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, Ready)
                | (Ready, Completed)
                | (Draft, Cancelled)
                | (Confirmed, Cancelled)
                | (Completed, Refunded)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::Takeaway => "takeaway",
            OrderType::Delivery => "delivery",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "dine_in" => OrderType::DineIn,
            "takeaway" => OrderType::Takeaway,
            "delivery" => OrderType::Delivery,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

impl OrderLine {
    pub fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinePatch {
    pub add: Vec<OrderLine>,
    pub remove_product_ids: Vec<String>,
    pub modify: Vec<OrderLine>,
}

/// Row shape as stored: `order_type`/`status` persist as plain `text`
/// columns and are parsed on the way out, rather than relying on a custom
/// Postgres enum type that the out-of-process migration tool would need to
/// keep in lockstep with this binary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: uuid::Uuid,
    pub restaurant_id: String,
    pub order_number: i64,
    pub order_type: String,
    pub status: String,
    pub lines: sqlx::types::Json<Vec<OrderLine>>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub service_charge_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub server_id: Option<String>,
    pub created_by: String,
    pub event_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: uuid::Uuid,
    pub restaurant_id: String,
    pub order_number: i64,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub service_charge_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub server_id: Option<String>,
    pub created_by: String,
    pub event_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order_type = OrderType::parse(&row.order_type)
            .ok_or_else(|| format!("unknown order_type '{}'", row.order_type))?;
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown order status '{}'", row.status))?;
        Ok(Order {
            id: row.id,
            restaurant_id: row.restaurant_id,
            order_number: row.order_number,
            order_type,
            status,
            lines: row.lines.0,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            service_charge_cents: row.service_charge_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            server_id: row.server_id,
            created_by: row.created_by,
            event_seq: row.event_seq,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Order {
    pub fn recompute_total(&self) -> (i64, i64) {
        let subtotal: i64 = self.lines.iter().map(|l| l.subtotal_cents()).sum();
        let total = subtotal + self.tax_cents + self.service_charge_cents - self.discount_cents;
        (subtotal, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_can_move_to_confirmed_or_cancelled() {
        assert!(OrderStatus::Draft.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Draft.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Draft.can_transition_to(OrderStatus::Preparing));
    }

    #[test]
    fn completed_order_only_allows_refund() {
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Preparing.is_terminal());
    }

    #[test]
    fn line_subtotal_multiplies_price_by_quantity() {
        let line = OrderLine {
            product_id: "p1".into(),
            name: "Burger".into(),
            unit_price_cents: 1250,
            quantity: 3,
        };
        assert_eq!(line.subtotal_cents(), 3750);
    }

    #[test]
    fn order_type_round_trips_through_its_string_form() {
        for t in [OrderType::DineIn, OrderType::Takeaway, OrderType::Delivery] {
            assert_eq!(OrderType::parse(t.as_str()), Some(t));
        }
    }
}
