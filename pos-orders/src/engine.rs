//! Order lifecycle engine: creation, line mutation, confirmation, status
//! advancement, and cancellation, all scoped by a tenant-bound transaction
//! and serialized per-order via `SELECT ... FOR UPDATE`.

use chrono::Utc;
use pos_db::tx::Tx;
use pos_events::EventBus;
use pos_security::tenant::TenantContext;

use crate::error::OrderError;
use crate::events::{OrderEvent, OrderEventKind};
use crate::model::{LinePatch, Order, OrderLine, OrderRow, OrderStatus, OrderType};

#[derive(Clone)]
pub struct OrderEngine<B: EventBus> {
    bus: B,
}

impl<B> OrderEngine<B>
where
    B: EventBus + Clone + 'static,
{
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Allocates the next order number for a restaurant by locking and
    /// incrementing its counter row, and inserts the new draft order.
    pub async fn create_order(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_type: OrderType,
        lines: Vec<OrderLine>,
    ) -> Result<Order, OrderError> {
        let (order_number,): (i64,) = sqlx::query_as(
            "INSERT INTO order_number_counters (restaurant_id, next_number) \
             VALUES ($1, 1) \
             ON CONFLICT (restaurant_id) DO UPDATE SET next_number = order_number_counters.next_number + 1 \
             RETURNING next_number",
        )
        .bind(&ctx.tenant_id)
        .fetch_one(tx.as_mut())
        .await?;

        let subtotal: i64 = lines.iter().map(OrderLine::subtotal_cents).sum();
        let lines_json = sqlx::types::Json(lines);

        let row: OrderRow = sqlx::query_as(
            "INSERT INTO orders \
             (restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
              tax_cents, service_charge_cents, discount_cents, total_cents, created_by, event_seq) \
             VALUES ($1, $2, $3, 'draft', $4, $5, 0, 0, 0, $5, $6, 0) \
             RETURNING id, restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
                       tax_cents, service_charge_cents, discount_cents, total_cents, server_id, \
                       created_by, event_seq, created_at, updated_at",
        )
        .bind(&ctx.tenant_id)
        .bind(order_number)
        .bind(order_type.as_str())
        .bind(lines_json)
        .bind(subtotal)
        .bind(&ctx.user_id)
        .fetch_one(tx.as_mut())
        .await?;

        Order::try_from(row).map_err(|e| OrderError::Db(decode_err(e)))
    }

    /// Only valid while the order is in `draft`. Recomputes totals from the
    /// patched line set. `patch.modify` replaces an existing line for the
    /// same `product_id` in place; `patch.add` appends new ones.
    pub async fn update_lines(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_id: uuid::Uuid,
        mut patch: LinePatch,
        tax_cents: i64,
        service_charge_cents: i64,
        discount_cents: i64,
    ) -> Result<Order, OrderError> {
        let order = self.lock_order(tx, ctx, order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(OrderError::InvalidTransition {
                from: order.status.as_str().into(),
                to: "lines-modified".into(),
            });
        }

        let lines = apply_line_patch(order.lines, patch);
        let subtotal: i64 = lines.iter().map(OrderLine::subtotal_cents).sum();
        let total = subtotal + tax_cents + service_charge_cents - discount_cents;

        let row: OrderRow = sqlx::query_as(
            "UPDATE orders SET lines = $1, subtotal_cents = $2, tax_cents = $3, \
             service_charge_cents = $4, discount_cents = $5, total_cents = $6, updated_at = NOW() \
             WHERE id = $7 \
             RETURNING id, restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
                       tax_cents, service_charge_cents, discount_cents, total_cents, server_id, \
                       created_by, event_seq, created_at, updated_at",
        )
        .bind(sqlx::types::Json(&lines))
        .bind(subtotal)
        .bind(tax_cents)
        .bind(service_charge_cents)
        .bind(discount_cents)
        .bind(total)
        .bind(order_id)
        .fetch_one(tx.as_mut())
        .await?;

        Order::try_from(row).map_err(|e| OrderError::Db(decode_err(e)))
    }

    /// Requires at least one line, every product currently available, and
    /// the restaurant open. Transitions `draft -> confirmed`. Returns the
    /// updated order plus the `order.confirmed` event; callers must commit
    /// the transaction before calling [`OrderEngine::publish`] with it, so a
    /// subscriber can never observe the event ahead of the state it
    /// describes.
    pub async fn confirm(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_id: uuid::Uuid,
        expected_total: Option<i64>,
    ) -> Result<(Order, OrderEvent), OrderError> {
        let order = self.lock_order(tx, ctx, order_id).await?;
        if order.lines.is_empty() {
            return Err(OrderError::ProductUnavailable("order has no lines".into()));
        }

        let restaurant_open: (bool,) =
            sqlx::query_as("SELECT is_open FROM restaurants WHERE id = $1")
                .bind(&ctx.tenant_id)
                .fetch_one(tx.as_mut())
                .await?;
        if !restaurant_open.0 {
            return Err(OrderError::RestaurantClosed);
        }

        for line in &order.lines {
            let available: Option<(bool,)> =
                sqlx::query_as("SELECT available FROM products WHERE id = $1")
                    .bind(&line.product_id)
                    .fetch_optional(tx.as_mut())
                    .await?;
            if !available.map(|(a,)| a).unwrap_or(false) {
                return Err(OrderError::ProductUnavailable(line.product_id.clone()));
            }
        }

        self.transition(
            tx,
            ctx,
            order,
            OrderStatus::Confirmed,
            expected_total,
            OrderEventKind::Confirmed,
        )
        .await
    }

    /// Generic state machine step, used for `confirmed -> preparing -> ready
    /// -> completed`. `confirm`/`cancel` wrap this with their own
    /// preconditions and event kinds.
    pub async fn advance_status(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_id: uuid::Uuid,
        target: OrderStatus,
        expected_total: Option<i64>,
    ) -> Result<(Order, OrderEvent), OrderError> {
        let order = self.lock_order(tx, ctx, order_id).await?;
        let from = order.status;
        self.transition(
            tx,
            ctx,
            order,
            target,
            expected_total,
            OrderEventKind::StatusChanged { from, to: target },
        )
        .await
    }

    /// Allowed only from `draft` or `confirmed`.
    pub async fn cancel(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_id: uuid::Uuid,
        reason: &str,
    ) -> Result<(Order, OrderEvent), OrderError> {
        let order = self.lock_order(tx, ctx, order_id).await?;
        if !matches!(order.status, OrderStatus::Draft | OrderStatus::Confirmed) {
            return Err(OrderError::InvalidTransition {
                from: order.status.as_str().into(),
                to: "cancelled".into(),
            });
        }
        tracing::info!(order_id = %order_id, reason, "cancelling order");
        self.transition(
            tx,
            ctx,
            order,
            OrderStatus::Cancelled,
            None,
            OrderEventKind::Cancelled,
        )
        .await
    }

    /// Publishes an event returned by `confirm`/`advance_status`/`cancel`.
    /// Must only be called after the transaction that produced it has
    /// committed.
    pub async fn publish(&self, event: OrderEvent) {
        self.bus.emit_and_wait(event).await;
    }

    async fn lock_order(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order_id: uuid::Uuid,
    ) -> Result<Order, OrderError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
                    tax_cents, service_charge_cents, discount_cents, total_cents, server_id, \
                    created_by, event_seq, created_at, updated_at \
             FROM orders WHERE id = $1 AND restaurant_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(&ctx.tenant_id)
        .fetch_optional(tx.as_mut())
        .await?;

        let row = row.ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        Order::try_from(row).map_err(|e| OrderError::Db(decode_err(e)))
    }

    async fn transition(
        &self,
        tx: &mut Tx<'_>,
        ctx: &TenantContext,
        order: Order,
        target: OrderStatus,
        expected_total: Option<i64>,
        kind: OrderEventKind,
    ) -> Result<(Order, OrderEvent), OrderError> {
        if !order.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: order.status.as_str().into(),
                to: target.as_str().into(),
            });
        }

        let (_, total) = order.recompute_total();
        if let Some(expected) = expected_total {
            if expected != total {
                return Err(OrderError::StaleOrderState {
                    expected,
                    actual: total,
                });
            }
        }

        let row: OrderRow = sqlx::query_as(
            "UPDATE orders SET status = $1, event_seq = event_seq + 1, updated_at = NOW() \
             WHERE id = $2 AND restaurant_id = $3 \
             RETURNING id, restaurant_id, order_number, order_type, status, lines, subtotal_cents, \
                       tax_cents, service_charge_cents, discount_cents, total_cents, server_id, \
                       created_by, event_seq, created_at, updated_at",
        )
        .bind(target.as_str())
        .bind(order.id)
        .bind(&ctx.tenant_id)
        .fetch_one(tx.as_mut())
        .await?;

        let updated = Order::try_from(row).map_err(|e| OrderError::Db(decode_err(e)))?;

        let event = OrderEvent {
            restaurant_id: ctx.tenant_id.clone(),
            order_id: updated.id,
            order_number: updated.order_number,
            seq: updated.event_seq,
            kind,
            occurred_at: Utc::now(),
        };

        Ok((updated, event))
    }
}

fn decode_err(message: String) -> pos_db::error::DbError {
    pos_db::error::DbError::Database(sqlx::Error::Decode(message.into()))
}

/// Applies a line patch: removals first, then in-place modification of
/// surviving lines, then appends. Pulled out of `update_lines` so the merge
/// logic can be tested without a database.
fn apply_line_patch(existing: Vec<OrderLine>, mut patch: LinePatch) -> Vec<OrderLine> {
    let mut lines: Vec<OrderLine> = existing
        .into_iter()
        .filter(|l| !patch.remove_product_ids.contains(&l.product_id))
        .map(|existing| {
            patch
                .modify
                .iter()
                .find(|m| m.product_id == existing.product_id)
                .cloned()
                .unwrap_or(existing)
        })
        .collect();
    lines.append(&mut patch.add);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: &str, price: i64, qty: i32) -> OrderLine {
        OrderLine {
            product_id: product_id.into(),
            name: product_id.into(),
            unit_price_cents: price,
            quantity: qty,
        }
    }

    #[test]
    fn patch_removes_then_modifies_then_adds() {
        let existing = vec![line("p1", 100, 1), line("p2", 200, 2)];
        let patch = LinePatch {
            add: vec![line("p3", 300, 1)],
            remove_product_ids: vec!["p2".into()],
            modify: vec![line("p1", 150, 1)],
        };
        let result = apply_line_patch(existing, patch);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].product_id, "p1");
        assert_eq!(result[0].unit_price_cents, 150);
        assert_eq!(result[1].product_id, "p3");
    }

    #[test]
    fn patch_with_no_changes_is_a_noop() {
        let existing = vec![line("p1", 100, 1)];
        let patch = LinePatch {
            add: vec![],
            remove_product_ids: vec![],
            modify: vec![],
        };
        let result = apply_line_patch(existing.clone(), patch);
        assert_eq!(result.len(), existing.len());
        assert_eq!(result[0].product_id, existing[0].product_id);
    }
}
