use super::artifact::build_artifact;
use super::machine::step;
use crate::audit::TransitionMeta;
use crate::error::{EngineError, EngineResult, TransitionScope};
use crate::locks::{EntityKey, EntityLocks, LockSet};
use crate::storage::{ChangeSet, OrderStore};
use crate::tokens::TokenCodec;
use crate::utils::Clock;
use serde::{Deserialize, Serialize};
use shared::models::{
    EntityType, Order, OrderStatus, PaymentHandle, PaymentMethod, PaymentRequest, PaymentStatus,
    TransitionRecord,
};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Result of resolving a payment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledRequest {
    pub request: PaymentRequest,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpaidOrder {
    pub order_id: i64,
    pub amount: i64,
    pub payment_status: PaymentStatus,
    pub created_at: i64,
}

/// 桌台未付金额汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnpaidSummary {
    pub table_id: i64,
    pub orders: Vec<UnpaidOrder>,
    pub total_amount: i64,
}

fn ensure_not_cancelled(order: &Order) -> EngineResult<()> {
    if order.order_status == OrderStatus::Cancelled {
        return Err(EngineError::OrderClosed {
            order_id: order.id,
            status: order.order_status,
        });
    }
    Ok(())
}

fn checked_sum(orders: &[Order]) -> EngineResult<i64> {
    orders
        .iter()
        .try_fold(0i64, |acc, o| acc.checked_add(o.grand_total))
        .ok_or_else(|| EngineError::Storage("payment total overflow".into()))
}

/// Per-order payments and the payment-request aggregate
pub struct PaymentStateMachine {
    store: Arc<dyn OrderStore>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn Clock>,
    codec: Arc<TokenCodec>,
    mobile_pay_scheme: String,
}

impl fmt::Debug for PaymentStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentStateMachine")
            .field("mobile_pay_scheme", &self.mobile_pay_scheme)
            .finish_non_exhaustive()
    }
}

impl PaymentStateMachine {
    pub fn new(
        store: Arc<dyn OrderStore>,
        locks: Arc<EntityLocks>,
        clock: Arc<dyn Clock>,
        codec: Arc<TokenCodec>,
        mobile_pay_scheme: impl Into<String>,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            codec,
            mobile_pay_scheme: mobile_pay_scheme.into(),
        }
    }

    // ========== Payment request (会计请求) ==========

    /// Group every unpaid order of the table into one request
    pub async fn create_request(
        &self,
        table_id: i64,
        meta: TransitionMeta,
    ) -> EngineResult<PaymentRequest> {
        let _table_lock = self.locks.lock(EntityKey::Table(table_id)).await;
        self.store.get_table(table_id).await?;

        let candidates: Vec<EntityKey> = self
            .store
            .orders_for_table(table_id)
            .await?
            .into_iter()
            .filter(|o| o.payment_status == PaymentStatus::Unpaid)
            .map(|o| EntityKey::Order(o.id))
            .collect();
        if candidates.is_empty() {
            return Err(EngineError::NoUnpaidOrders(table_id));
        }

        // 表锁之后再锁订单，锁内重新读取
        let _order_locks = self.locks.acquire(candidates).await;
        let mut orders: Vec<Order> = self
            .store
            .orders_for_table(table_id)
            .await?
            .into_iter()
            .filter(|o| {
                o.payment_status == PaymentStatus::Unpaid && o.order_status != OrderStatus::Cancelled
            })
            .collect();
        if orders.is_empty() {
            return Err(EngineError::NoUnpaidOrders(table_id));
        }
        orders.sort_by_key(|o| o.id);

        let now = self.clock.now_millis();
        let request_id = format!("PR-{}", Uuid::new_v4().simple());
        let note = Some(format!("request {}", request_id));
        let mut changes = ChangeSet::new();
        for order in &mut orders {
            step(order, PaymentStatus::Requested, &meta, note.clone(), now, &mut changes)?;
            changes.update_order(order.clone());
        }

        let request = PaymentRequest {
            request_id: request_id.clone(),
            table_id,
            order_ids: orders.iter().map(|o| o.id).collect(),
            total_amount: checked_sum(&orders)?,
            status: PaymentStatus::Requested,
            created_at: now,
            completed_at: None,
            payment_method: None,
            staff_id: None,
            version: 0,
        };
        changes.insert_payment_request(request.clone());
        changes.record(meta.stamp(TransitionRecord::new(
            EntityType::PaymentRequest,
            &request_id,
            PaymentStatus::Unpaid,
            PaymentStatus::Requested,
            now,
        )));
        self.store.commit(changes).await?;

        tracing::info!(
            request_id = %request_id,
            table_id,
            orders = request.order_ids.len(),
            total_amount = request.total_amount,
            "Payment request created"
        );
        Ok(request)
    }

    /// Settle every order of the request, all or nothing
    pub async fn complete_request(
        &self,
        request_id: &str,
        method: PaymentMethod,
        staff_id: impl Into<String>,
    ) -> EngineResult<SettledRequest> {
        let staff_id = staff_id.into();
        let meta = TransitionMeta::by(staff_id.clone());
        let (mut request, mut orders, _locks) = self.lock_request(request_id).await?;

        if request.status != PaymentStatus::Requested {
            return Err(EngineError::illegal(
                TransitionScope::PaymentRequest,
                request.status,
                PaymentStatus::Paid,
            ));
        }

        let now = self.clock.now_millis();
        let paid_note = Some(format!("request {} settled, order completed", request_id));
        let mut changes = ChangeSet::new();
        for order in &mut orders {
            ensure_not_cancelled(order)?;
            if order.payment_status != PaymentStatus::Requested {
                tracing::warn!(
                    request_id,
                    order_id = order.id,
                    status = %order.payment_status,
                    "Payment request settlement aborted"
                );
                return Err(EngineError::illegal(
                    TransitionScope::PaymentStatus,
                    order.payment_status,
                    PaymentStatus::Pending,
                ));
            }
            step(order, PaymentStatus::Pending, &meta, None, now, &mut changes)?;
            step(order, PaymentStatus::Paid, &meta, paid_note.clone(), now, &mut changes)?;
            order.order_status = OrderStatus::Completed;
            order.completed_at = Some(now);
            order.payment_method = Some(method);
            order.payment_id = Some(request_id.to_string());
            changes.update_order(order.clone());
        }

        changes.record(meta.stamp(TransitionRecord::new(
            EntityType::PaymentRequest,
            request_id,
            request.status,
            PaymentStatus::Paid,
            now,
        )));
        request.status = PaymentStatus::Paid;
        request.completed_at = Some(now);
        request.payment_method = Some(method);
        request.staff_id = Some(staff_id);
        changes.update_payment_request(request.clone());
        self.store.commit(changes).await?;

        request.version += 1;
        orders.iter_mut().for_each(|o| o.version += 1);
        tracing::info!(
            request_id,
            method = %method,
            total_amount = request.total_amount,
            "Payment request settled"
        );
        Ok(SettledRequest { request, orders })
    }

    /// Withdraw a request; its still-requested orders return to Unpaid
    pub async fn cancel_request(
        &self,
        request_id: &str,
        meta: TransitionMeta,
    ) -> EngineResult<SettledRequest> {
        let (mut request, orders, _locks) = self.lock_request(request_id).await?;

        if request.status != PaymentStatus::Requested {
            return Err(EngineError::illegal(
                TransitionScope::PaymentRequest,
                request.status,
                PaymentStatus::Cancelled,
            ));
        }

        let now = self.clock.now_millis();
        let note = Some(format!("request {} cancelled", request_id));
        let mut changes = ChangeSet::new();
        let mut released = Vec::with_capacity(orders.len());
        for mut order in orders {
            if order.payment_status != PaymentStatus::Requested {
                continue;
            }
            step(&mut order, PaymentStatus::Unpaid, &meta, note.clone(), now, &mut changes)?;
            changes.update_order(order.clone());
            order.version += 1;
            released.push(order);
        }

        changes.record(meta.stamp(TransitionRecord::new(
            EntityType::PaymentRequest,
            request_id,
            request.status,
            PaymentStatus::Cancelled,
            now,
        )));
        request.status = PaymentStatus::Cancelled;
        request.completed_at = Some(now);
        changes.update_payment_request(request.clone());
        self.store.commit(changes).await?;
        request.version += 1;

        tracing::info!(request_id, released = released.len(), "Payment request cancelled");
        Ok(SettledRequest {
            request,
            orders: released,
        })
    }

    /// Lock the request and all its orders, then read them inside the locks
    async fn lock_request(
        &self,
        request_id: &str,
    ) -> EngineResult<(PaymentRequest, Vec<Order>, LockSet)> {
        // order_ids 创建后不变，锁外读取即可确定锁集合
        let order_ids = self.store.get_payment_request(request_id).await?.order_ids;
        let mut keys: Vec<EntityKey> = order_ids.iter().map(|id| EntityKey::Order(*id)).collect();
        keys.push(EntityKey::PaymentRequest(request_id.to_string()));
        let locks = self.locks.acquire(keys).await;

        let request = self.store.get_payment_request(request_id).await?;
        let mut ids = request.order_ids.clone();
        ids.sort_unstable();
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            orders.push(self.store.get_order(id).await?);
        }
        Ok((request, orders, locks))
    }

    // ========== Single order payment ==========

    /// Start paying one order; returns the handle carrying the artifact
    pub async fn initiate(
        &self,
        order_id: i64,
        method: PaymentMethod,
        meta: TransitionMeta,
    ) -> EngineResult<PaymentHandle> {
        let _locks = self.locks.lock(EntityKey::Order(order_id)).await;
        let mut order = self.store.get_order(order_id).await?;

        ensure_not_cancelled(&order)?;
        if order.payment_status == PaymentStatus::Paid {
            return Err(EngineError::AlreadyPaid(order_id));
        }

        let now = self.clock.now_millis();
        let mut changes = ChangeSet::new();
        if order.payment_status == PaymentStatus::Unpaid {
            step(&mut order, PaymentStatus::Requested, &meta, None, now, &mut changes)?;
        }
        step(
            &mut order,
            PaymentStatus::Pending,
            &meta,
            Some(format!("initiated by {}", method)),
            now,
            &mut changes,
        )
        .inspect_err(|_| {
            tracing::warn!(order_id, status = %order.payment_status, "Payment initiation rejected");
        })?;

        let artifact = build_artifact(
            &self.codec,
            &self.mobile_pay_scheme,
            order_id,
            order.grand_total,
            method,
        )?;
        let payment_id = Uuid::new_v4().to_string();
        order.payment_id = Some(payment_id.clone());
        order.payment_method = Some(method);
        order.payment_note = None;
        changes.update_order(order.clone());
        self.store.commit(changes).await?;

        tracing::info!(
            order_id,
            payment_id = %payment_id,
            method = %method,
            amount = order.grand_total,
            "Payment initiated"
        );
        Ok(PaymentHandle {
            payment_id,
            order_id,
            amount: order.grand_total,
            method,
            artifact,
            created_at: now,
        })
    }

    /// Pending → Paid; the order is completed in the same step
    pub async fn complete(&self, handle: &PaymentHandle, meta: TransitionMeta) -> EngineResult<Order> {
        let order_id = handle.order_id;
        let _locks = self.locks.lock(EntityKey::Order(order_id)).await;
        let mut order = self.store.get_order(order_id).await?;
        self.ensure_active_handle(&order, handle)?;

        let now = self.clock.now_millis();
        let mut changes = ChangeSet::new();
        let note = (order.order_status != OrderStatus::Completed).then(|| "order completed".to_string());
        step(&mut order, PaymentStatus::Paid, &meta, note, now, &mut changes)?;
        order.order_status = OrderStatus::Completed;
        order.completed_at = Some(now);
        order.payment_method = Some(handle.method);
        changes.update_order(order.clone());
        self.store.commit(changes).await?;
        order.version += 1;

        tracing::info!(
            order_id,
            payment_id = %handle.payment_id,
            method = %handle.method,
            amount = handle.amount,
            "Payment completed"
        );
        Ok(order)
    }

    /// Pending → Failed → Unpaid, keeping the reason on the order
    pub async fn cancel(
        &self,
        handle: &PaymentHandle,
        reason: impl Into<String>,
        meta: TransitionMeta,
    ) -> EngineResult<Order> {
        let reason = reason.into();
        let order_id = handle.order_id;
        let _locks = self.locks.lock(EntityKey::Order(order_id)).await;
        let mut order = self.store.get_order(order_id).await?;
        self.ensure_active_handle(&order, handle)?;

        let now = self.clock.now_millis();
        let mut changes = ChangeSet::new();
        step(&mut order, PaymentStatus::Failed, &meta, Some(reason.clone()), now, &mut changes)?;
        step(
            &mut order,
            PaymentStatus::Unpaid,
            &meta,
            Some("rolled back".into()),
            now,
            &mut changes,
        )?;
        order.payment_id = None;
        order.payment_method = None;
        order.payment_note = Some(reason.clone());
        changes.update_order(order.clone());
        self.store.commit(changes).await?;
        order.version += 1;

        tracing::info!(order_id, payment_id = %handle.payment_id, reason = %reason, "Payment cancelled");
        Ok(order)
    }

    fn ensure_active_handle(&self, order: &Order, handle: &PaymentHandle) -> EngineResult<()> {
        if order.payment_status != PaymentStatus::Pending {
            tracing::warn!(
                order_id = order.id,
                status = %order.payment_status,
                "Payment is not pending"
            );
            return Err(EngineError::NotPending {
                order_id: order.id,
                status: order.payment_status,
            });
        }
        if order.payment_id.as_deref() != Some(handle.payment_id.as_str()) {
            return Err(EngineError::PaymentNotFound(handle.payment_id.clone()));
        }
        if handle.amount != order.grand_total {
            return Err(EngineError::AmountMismatch {
                order_id: order.id,
                token_amount: handle.amount,
                order_total: order.grand_total,
            });
        }
        Ok(())
    }

    // ========== Queries ==========

    /// Handle of the order's in-flight payment, if any
    ///
    /// A cash barcode is re-issued with a fresh timestamp.
    pub async fn payment_status(&self, order_id: i64) -> EngineResult<Option<PaymentHandle>> {
        let order = self.store.get_order(order_id).await?;
        self.current_handle(&order)
    }

    pub(crate) fn current_handle(&self, order: &Order) -> EngineResult<Option<PaymentHandle>> {
        let (Some(payment_id), Some(method)) = (&order.payment_id, order.payment_method) else {
            return Ok(None);
        };
        if order.payment_status != PaymentStatus::Pending {
            return Ok(None);
        }
        let artifact = build_artifact(
            &self.codec,
            &self.mobile_pay_scheme,
            order.id,
            order.grand_total,
            method,
        )?;
        Ok(Some(PaymentHandle {
            payment_id: payment_id.clone(),
            order_id: order.id,
            amount: order.grand_total,
            method,
            artifact,
            created_at: order.updated_at,
        }))
    }

    pub async fn get_payment_request(&self, request_id: &str) -> EngineResult<PaymentRequest> {
        Ok(self.store.get_payment_request(request_id).await?)
    }

    /// Orders still owing money (Unpaid or Requested)
    pub async fn table_unpaid_summary(&self, table_id: i64) -> EngineResult<UnpaidSummary> {
        self.store.get_table(table_id).await?;
        let outstanding: Vec<Order> = self
            .store
            .orders_for_table(table_id)
            .await?
            .into_iter()
            .filter(|o| o.order_status != OrderStatus::Cancelled && o.payment_status.is_outstanding())
            .collect();

        Ok(UnpaidSummary {
            table_id,
            total_amount: checked_sum(&outstanding)?,
            orders: outstanding
                .iter()
                .map(|o| UnpaidOrder {
                    order_id: o.id,
                    amount: o.grand_total,
                    payment_status: o.payment_status,
                    created_at: o.created_at,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::{HistoryQuery, InMemoryStore};
    use crate::tokens::StaticSecrets;
    use crate::utils::ManualClock;
    use shared::models::{DiningTable, PaymentArtifact, TableStatus};

    const T0: i64 = 1_737_700_000_000;

    struct Fixture {
        payments: PaymentStateMachine,
        store: Arc<InMemoryStore>,
        codec: Arc<TokenCodec>,
    }

    fn create_fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let mut table = DiningTable::new(1, "A1", 4, T0);
        table.status = TableStatus::Occupied;
        store.seed_table(table);
        store.seed_table(DiningTable::new(2, "A2", 2, T0));

        let clock = Arc::new(ManualClock::new(T0));
        let codec = Arc::new(TokenCodec::new(
            Arc::new(StaticSecrets::new("t", "p")),
            clock.clone(),
            86_400_000,
            1_800_000,
        ));
        let payments = PaymentStateMachine::new(
            store.clone(),
            Arc::new(EntityLocks::new()),
            clock,
            codec.clone(),
            "mobilepay://payment",
        );
        Fixture {
            payments,
            store,
            codec,
        }
    }

    fn seed_order(store: &InMemoryStore, id: i64, grand_total: i64) {
        store.seed_order(Order {
            id,
            table_id: 1,
            line_items: vec![],
            subtotal: grand_total,
            tax_amount: 0,
            grand_total,
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            payment_id: None,
            payment_note: None,
            created_at: T0,
            updated_at: T0,
            completed_at: None,
            version: 0,
        });
    }

    async fn order(store: &InMemoryStore, id: i64) -> Order {
        store.get_order(id).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_request_groups_unpaid_orders() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1100);
        seed_order(&f.store, 1002, 550);

        let request = f
            .payments
            .create_request(1, TransitionMeta::by("customer"))
            .await
            .unwrap();
        assert!(request.request_id.starts_with("PR-"));
        assert_eq!(request.order_ids, vec![1001, 1002]);
        assert_eq!(request.total_amount, 1650);
        assert_eq!(request.status, PaymentStatus::Requested);
        assert_eq!(order(&f.store, 1001).await.payment_status, PaymentStatus::Requested);

        // 已请求的订单不会再次分组
        let err = f
            .payments
            .create_request(1, TransitionMeta::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoUnpaidOrders);
    }

    #[tokio::test]
    async fn test_create_request_without_orders() {
        let f = create_fixture();
        let err = f
            .payments
            .create_request(2, TransitionMeta::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoUnpaidOrders);

        let err = f
            .payments
            .create_request(99, TransitionMeta::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_complete_request_settles_every_order() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1100);
        seed_order(&f.store, 1002, 550);
        let request = f.payments.create_request(1, TransitionMeta::new()).await.unwrap();

        let settled = f
            .payments
            .complete_request(&request.request_id, PaymentMethod::Cash, "STAFF1")
            .await
            .unwrap();
        assert_eq!(settled.request.status, PaymentStatus::Paid);
        assert_eq!(settled.request.staff_id.as_deref(), Some("STAFF1"));
        assert_eq!(settled.orders.len(), 2);
        for id in [1001, 1002] {
            let o = order(&f.store, id).await;
            assert_eq!(o.payment_status, PaymentStatus::Paid);
            assert_eq!(o.order_status, OrderStatus::Completed);
            assert_eq!(o.payment_method, Some(PaymentMethod::Cash));
            assert_eq!(o.completed_at, Some(T0));
        }
        assert_eq!(
            f.store.get_payment_request(&request.request_id).await.unwrap(),
            settled.request
        );

        // 重放
        let err = f
            .payments
            .complete_request(&request.request_id, PaymentMethod::Cash, "STAFF1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[tokio::test]
    async fn test_complete_request_is_all_or_nothing() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1100);
        seed_order(&f.store, 1002, 550);
        let request = f.payments.create_request(1, TransitionMeta::new()).await.unwrap();

        // 1002 单独发起了支付，不再是 Requested
        f.payments
            .initiate(1002, PaymentMethod::CreditCard, TransitionMeta::new())
            .await
            .unwrap();
        let history_before = f.store.history_len();

        let err = f
            .payments
            .complete_request(&request.request_id, PaymentMethod::Cash, "STAFF1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);

        assert_eq!(order(&f.store, 1001).await.payment_status, PaymentStatus::Requested);
        assert_eq!(order(&f.store, 1002).await.payment_status, PaymentStatus::Pending);
        assert_eq!(
            f.store
                .get_payment_request(&request.request_id)
                .await
                .unwrap()
                .status,
            PaymentStatus::Requested
        );
        assert_eq!(f.store.history_len(), history_before);
    }

    #[tokio::test]
    async fn test_cancel_request_releases_orders() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1100);
        let request = f.payments.create_request(1, TransitionMeta::new()).await.unwrap();

        let cancelled = f
            .payments
            .cancel_request(&request.request_id, TransitionMeta::by("STAFF2"))
            .await
            .unwrap();
        assert_eq!(cancelled.request.status, PaymentStatus::Cancelled);
        assert_eq!(order(&f.store, 1001).await.payment_status, PaymentStatus::Unpaid);

        let err = f
            .payments
            .complete_request(&request.request_id, PaymentMethod::Cash, "STAFF1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[tokio::test]
    async fn test_initiate_and_complete_cash() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1920);

        let handle = f
            .payments
            .initiate(1001, PaymentMethod::Cash, TransitionMeta::new())
            .await
            .unwrap();
        assert_eq!(handle.amount, 1920);
        let PaymentArtifact::Barcode { token } = &handle.artifact else {
            panic!("cash payment must carry a barcode");
        };
        let claims = f.codec.verify_payment_token(token).unwrap();
        assert_eq!((claims.order_id, claims.amount), (1001, 1920));

        let pending = order(&f.store, 1001).await;
        assert_eq!(pending.payment_status, PaymentStatus::Pending);
        assert_eq!(pending.payment_id.as_deref(), Some(handle.payment_id.as_str()));

        let paid = f.payments.complete(&handle, TransitionMeta::new()).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.order_status, OrderStatus::Completed);
        assert_eq!(paid, order(&f.store, 1001).await);

        // unpaid → requested → pending → paid
        let history = f
            .store
            .history(&HistoryQuery::for_entity(EntityType::Order, 1001))
            .await
            .unwrap();
        let states: Vec<_> = history.iter().map(|r| r.to_state.as_str()).collect();
        assert_eq!(states, vec!["requested", "pending", "paid"]);
        assert!(history.iter().all(|r| r.is_payment()));
    }

    #[tokio::test]
    async fn test_complete_twice_fails_not_pending() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1920);
        let handle = f
            .payments
            .initiate(1001, PaymentMethod::Cash, TransitionMeta::new())
            .await
            .unwrap();
        f.payments.complete(&handle, TransitionMeta::new()).await.unwrap();

        for _ in 0..2 {
            let err = f
                .payments
                .complete(&handle, TransitionMeta::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotPending);
        }
        assert_eq!(order(&f.store, 1001).await.payment_status, PaymentStatus::Paid);

        let err = f
            .payments
            .initiate(1001, PaymentMethod::Cash, TransitionMeta::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyPaid);
    }

    #[tokio::test]
    async fn test_cancel_rolls_back_and_stale_handle_rejected() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 700);
        let first = f
            .payments
            .initiate(1001, PaymentMethod::MobilePayment, TransitionMeta::new())
            .await
            .unwrap();
        assert_eq!(
            first.artifact,
            PaymentArtifact::MobileDeepLink {
                url: "mobilepay://payment?amount=700&reference=1001".into()
            }
        );

        let rolled_back = f
            .payments
            .cancel(&first, "customer left", TransitionMeta::new())
            .await
            .unwrap();
        assert_eq!(rolled_back.payment_status, PaymentStatus::Unpaid);
        assert_eq!(rolled_back.payment_note.as_deref(), Some("customer left"));
        assert!(rolled_back.payment_id.is_none());

        let second = f
            .payments
            .initiate(1001, PaymentMethod::CreditCard, TransitionMeta::new())
            .await
            .unwrap();
        let err = f
            .payments
            .complete(&first, TransitionMeta::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PaymentNotFound);

        f.payments.complete(&second, TransitionMeta::new()).await.unwrap();

        let history = f
            .store
            .history(&HistoryQuery::for_entity(EntityType::Order, 1001))
            .await
            .unwrap();
        let failed = history.iter().find(|r| r.to_state == "failed").unwrap();
        assert_eq!(failed.note.as_deref(), Some("customer left"));
    }

    #[tokio::test]
    async fn test_cancel_requires_pending() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 700);
        let handle = f
            .payments
            .initiate(1001, PaymentMethod::Cash, TransitionMeta::new())
            .await
            .unwrap();
        f.payments
            .cancel(&handle, "wrong method", TransitionMeta::new())
            .await
            .unwrap();

        let err = f
            .payments
            .cancel(&handle, "again", TransitionMeta::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotPending);
    }

    #[tokio::test]
    async fn test_unpaid_summary_and_payment_status() {
        let f = create_fixture();
        seed_order(&f.store, 1001, 1100);
        seed_order(&f.store, 1002, 400);
        f.payments.create_request(1, TransitionMeta::new()).await.unwrap();
        seed_order(&f.store, 1003, 250);

        let summary = f.payments.table_unpaid_summary(1).await.unwrap();
        assert_eq!(summary.orders.len(), 3);
        assert_eq!(summary.total_amount, 1750);

        assert!(f.payments.payment_status(1003).await.unwrap().is_none());
        let handle = f
            .payments
            .initiate(1003, PaymentMethod::CreditCard, TransitionMeta::new())
            .await
            .unwrap();
        let current = f.payments.payment_status(1003).await.unwrap().unwrap();
        assert_eq!(current.payment_id, handle.payment_id);
        assert_eq!(current.artifact, handle.artifact);

        let summary = f.payments.table_unpaid_summary(1).await.unwrap();
        assert_eq!(summary.total_amount, 1500);
    }
}
