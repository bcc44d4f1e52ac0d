use super::money::{compute_totals, snapshot_line_item};
use crate::audit::TransitionMeta;
use crate::error::{EngineError, EngineResult, TransitionScope};
use crate::locks::{EntityKey, EntityLocks};
use crate::storage::{ChangeSet, OrderStore};
use crate::tables::plan_transition;
use crate::utils::Clock;
use rust_decimal::Decimal;
use shared::models::{
    EntityType, ItemStatus, LineItem, LineItemInput, Order, OrderStatus, PaymentStatus,
    TableStatus, TransitionRecord,
};
use std::fmt;
use std::sync::Arc;

/// Staff-driven order status edges (cancellation excluded)
pub fn can_advance(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Processing)
            | (OrderStatus::Pending, OrderStatus::Completed)
            | (OrderStatus::Processing, OrderStatus::Completed)
    )
}

fn ensure_open(order: &Order) -> EngineResult<()> {
    if order.order_status.is_terminal() {
        return Err(EngineError::OrderClosed {
            order_id: order.id,
            status: order.order_status,
        });
    }
    Ok(())
}

fn status_record(order: &Order, from: OrderStatus, to: OrderStatus, now: i64) -> TransitionRecord {
    TransitionRecord::new(EntityType::Order, order.id, from, to, now)
}

fn payment_record(
    order: &Order,
    from: PaymentStatus,
    to: PaymentStatus,
    now: i64,
) -> TransitionRecord {
    TransitionRecord::new(EntityType::Order, order.id, from, to, now).for_payment()
}

/// Creates orders and moves their fulfillment status
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn Clock>,
    tax_rate: Decimal,
}

impl fmt::Debug for OrderLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderLifecycle")
            .field("tax_rate", &self.tax_rate)
            .finish_non_exhaustive()
    }
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn OrderStore>,
        locks: Arc<EntityLocks>,
        clock: Arc<dyn Clock>,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            tax_rate,
        }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// 下单：快照菜品与单价，并把桌台置为 Occupied
    ///
    /// The table transition and the order insert commit together: if the
    /// table cannot become `Occupied`, no order is created.
    pub async fn create_order(
        &self,
        table_id: i64,
        items: Vec<LineItemInput>,
        meta: TransitionMeta,
    ) -> EngineResult<Order> {
        if items.is_empty() {
            return Err(EngineError::EmptyOrder);
        }
        let line_items = items
            .iter()
            .map(snapshot_line_item)
            .collect::<EngineResult<Vec<LineItem>>>()?;
        let totals = compute_totals(&line_items, self.tax_rate)?;

        let _locks = self.locks.lock(EntityKey::Table(table_id)).await;
        let table = self.store.get_table(table_id).await?;
        let now = self.clock.now_millis();
        let plan = plan_transition(&table, TableStatus::Occupied, &meta, now).inspect_err(|_| {
            tracing::warn!(table_id, status = %table.status, "Cannot seat order on table");
        })?;

        let order = Order {
            id: self.store.next_order_id().await?,
            table_id,
            line_items,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            grand_total: totals.grand_total,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            payment_id: None,
            payment_note: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
        };

        let mut changes = ChangeSet::new();
        plan.stage(&mut changes);
        changes.insert_order(order.clone());
        self.store.commit(changes).await?;

        tracing::info!(
            order_id = order.id,
            table_id,
            items = order.line_items.len(),
            grand_total = order.grand_total,
            "Order created"
        );
        Ok(order)
    }

    /// 取消订单
    pub async fn cancel_order(&self, order_id: i64, meta: TransitionMeta) -> EngineResult<Order> {
        let _locks = self.locks.lock(EntityKey::Order(order_id)).await;
        let mut order = self.store.get_order(order_id).await?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(EngineError::AlreadyPaid(order_id));
        }
        ensure_open(&order)?;
        if order.payment_status == PaymentStatus::Pending {
            // 支付进行中，需先取消支付
            return Err(EngineError::illegal(
                TransitionScope::PaymentStatus,
                PaymentStatus::Pending,
                PaymentStatus::Cancelled,
            ));
        }

        let now = self.clock.now_millis();
        let mut changes = ChangeSet::new();
        changes.record(meta.stamp(status_record(
            &order,
            order.order_status,
            OrderStatus::Cancelled,
            now,
        )));
        order.order_status = OrderStatus::Cancelled;

        if matches!(
            order.payment_status,
            PaymentStatus::Unpaid | PaymentStatus::Requested | PaymentStatus::Failed
        ) {
            changes.record(meta.stamp(payment_record(
                &order,
                order.payment_status,
                PaymentStatus::Cancelled,
                now,
            )));
            order.payment_status = PaymentStatus::Cancelled;
        }
        order.updated_at = now;
        order.completed_at = Some(now);

        changes.update_order(order.clone());
        self.store.commit(changes).await?;
        order.version += 1;

        tracing::info!(order_id, table_id = order.table_id, actor = ?meta.actor, "Order cancelled");
        Ok(order)
    }

    /// Staff moves the order to Processing or Completed
    pub async fn advance_status(
        &self,
        order_id: i64,
        target: OrderStatus,
        meta: TransitionMeta,
    ) -> EngineResult<Order> {
        let _locks = self.locks.lock(EntityKey::Order(order_id)).await;
        let mut order = self.store.get_order(order_id).await?;

        ensure_open(&order)?;
        if !can_advance(order.order_status, target) {
            tracing::warn!(order_id, from = %order.order_status, to = %target, "Order status change rejected");
            return Err(EngineError::illegal(
                TransitionScope::OrderStatus,
                order.order_status,
                target,
            ));
        }

        let now = self.clock.now_millis();
        let mut changes = ChangeSet::new();
        changes.record(meta.stamp(status_record(&order, order.order_status, target, now)));
        order.order_status = target;
        order.updated_at = now;
        if target == OrderStatus::Completed {
            order.completed_at = Some(now);
        }

        changes.update_order(order.clone());
        self.store.commit(changes).await?;
        order.version += 1;

        tracing::info!(order_id, status = %target, "Order status advanced");
        Ok(order)
    }

    /// Kitchen moves one line item forward; the first item leaving Pending
    /// puts the order into Processing
    pub async fn update_item_status(
        &self,
        order_id: i64,
        index: usize,
        status: ItemStatus,
        meta: TransitionMeta,
    ) -> EngineResult<Order> {
        let _locks = self.locks.lock(EntityKey::Order(order_id)).await;
        let mut order = self.store.get_order(order_id).await?;

        ensure_open(&order)?;
        let current = order
            .line_items
            .get(index)
            .map(|item| item.status)
            .ok_or(EngineError::ItemNotFound { order_id, index })?;
        if status == current {
            return Ok(order);
        }
        if status < current {
            return Err(EngineError::illegal(
                TransitionScope::OrderStatus,
                current,
                status,
            ));
        }

        let now = self.clock.now_millis();
        let mut changes = ChangeSet::new();
        if let Some(item) = order.line_items.get_mut(index) {
            item.status = status;
        }
        if order.order_status == OrderStatus::Pending {
            changes.record(
                meta.stamp(status_record(
                    &order,
                    OrderStatus::Pending,
                    OrderStatus::Processing,
                    now,
                ))
                .with_note(Some(format!("item {} {}", index, status))),
            );
            order.order_status = OrderStatus::Processing;
        }
        order.updated_at = now;

        changes.update_order(order.clone());
        self.store.commit(changes).await?;
        order.version += 1;

        tracing::debug!(order_id, index, status = %status, "Line item status updated");
        Ok(order)
    }

    // ========== Queries ==========

    pub async fn get_order(&self, order_id: i64) -> EngineResult<Order> {
        Ok(self.store.get_order(order_id).await?)
    }

    pub async fn orders_for_table(&self, table_id: i64) -> EngineResult<Vec<Order>> {
        Ok(self.store.orders_for_table(table_id).await?)
    }
}
