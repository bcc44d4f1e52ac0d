//! End-to-end flows over the engine: QR seating, table checkout, barcode
//! checkout, replay, concurrency and reports.

use order_engine::{
    Config, EngineState, ErrorKind, InMemoryStore, ManualClock, StaticSecrets, TransitionMeta,
};
use shared::error::{ApiResponse, AppError, ErrorCategory, ErrorCode};
use shared::models::{
    DateRange, DiningTable, EntityType, LineItemInput, OrderStatus, PaymentArtifact, PaymentMethod,
    PaymentStatus, TableStatus,
};
use std::sync::Arc;

const T0: i64 = 1_737_700_000_000;
const MINUTE: i64 = 60_000;

struct Harness {
    state: EngineState,
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
}

fn create_harness() -> Harness {
    let config = Config::with_secrets("table-secret-for-tests", "payment-secret-for-tests");
    let store = Arc::new(InMemoryStore::new());
    store.seed_table(DiningTable::new(1, "A1", 4, T0));
    store.seed_table(DiningTable::new(2, "A2", 2, T0));

    let clock = Arc::new(ManualClock::new(T0));
    let secrets = Arc::new(StaticSecrets::from_config(&config));
    let state = EngineState::new(config, store.clone(), clock.clone(), secrets);
    Harness {
        state,
        store,
        clock,
    }
}

fn simple_item(quantity: i32, unit_price: i64) -> LineItemInput {
    LineItemInput {
        menu_item_id: 42,
        name: "Katsu curry".into(),
        quantity,
        unit_price,
        note: None,
    }
}

fn customer() -> TransitionMeta {
    TransitionMeta::by("customer")
}

// ========== 完整流程 ==========

#[tokio::test]
async fn test_table_checkout_scenario() {
    let h = create_harness();
    let state = &h.state;

    // 扫码入座
    let token = state.tokens.issue_table_token(1).unwrap();
    let seating = state.seat_by_qr(&token, customer()).await.unwrap();
    assert_eq!(seating.table.status, TableStatus::Occupied);
    assert!(!seating.reused_session);
    assert_eq!(seating.claims.table_id, 1);

    // 下单
    h.clock.advance(2 * MINUTE);
    let order = state
        .orders
        .create_order(1, vec![simple_item(2, 500)], customer())
        .await
        .unwrap();
    assert_eq!(order.subtotal, 1000);
    assert_eq!(order.tax_amount, 100);
    assert_eq!(order.grand_total, 1100);

    // 请求结账
    h.clock.advance(40 * MINUTE);
    let checkout = state.request_checkout(1, customer()).await.unwrap();
    assert_eq!(checkout.value.order_ids, vec![order.id]);
    assert_eq!(checkout.value.total_amount, 1100);
    assert_eq!(
        checkout.table.map(|t| t.status),
        Some(TableStatus::PaymentRequested)
    );

    // 员工收款
    h.clock.advance(5 * MINUTE);
    let settled = state
        .settle_payment_request(&checkout.value.request_id, PaymentMethod::Cash, "STAFF1")
        .await
        .unwrap();
    let paid = &settled.value.orders[0];
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.order_status, OrderStatus::Completed);
    assert_eq!(
        settled.table.map(|t| t.status),
        Some(TableStatus::PaymentCompleted)
    );

    // 清台
    h.clock.advance(3 * MINUTE);
    state.start_cleaning(1, "STAFF1").await.unwrap();
    h.clock.advance(3 * MINUTE);
    let table = state.finish_cleaning(1, "STAFF1").await.unwrap();
    assert_eq!(table.status, TableStatus::Available);

    let table_history = state
        .get_history(EntityType::Table, 1, DateRange::all())
        .await
        .unwrap();
    assert_eq!(table_history.len(), 6);
    assert_eq!(
        table_history
            .iter()
            .map(|r| r.to_state.as_str())
            .collect::<Vec<_>>(),
        vec![
            "occupied",
            "occupied",
            "payment_requested",
            "payment_completed",
            "cleaning",
            "available"
        ]
    );

    let order_history = state
        .get_history(EntityType::Order, order.id, DateRange::all())
        .await
        .unwrap();
    assert_eq!(order_history.len(), 3);
    assert_eq!(order_history[2].to_state, "paid");
    assert_eq!(order_history[2].actor.as_deref(), Some("STAFF1"));

    let request_history = state
        .get_history(EntityType::PaymentRequest, &checkout.value.request_id, DateRange::all())
        .await
        .unwrap();
    assert_eq!(request_history.len(), 2);
}

#[tokio::test]
async fn test_reports_after_checkout() {
    let h = create_harness();
    let state = &h.state;

    state
        .tables
        .transition(1, TableStatus::Occupied, customer())
        .await
        .unwrap();
    let order = state
        .orders
        .create_order(1, vec![simple_item(2, 500)], customer())
        .await
        .unwrap();
    h.clock.advance(50 * MINUTE);
    let checkout = state.request_checkout(1, customer()).await.unwrap();
    state
        .settle_payment_request(&checkout.value.request_id, PaymentMethod::Cash, "STAFF1")
        .await
        .unwrap();

    let report = state.table_status_report(DateRange::all()).await.unwrap();
    assert_eq!(report.seatings.get("1"), Some(&1));
    assert_eq!(report.occupied_minutes.get("1"), Some(&50));
    assert_eq!(report.status_counts.get("occupied"), Some(&1));

    let report = state.payment_report(DateRange::all()).await.unwrap();
    let cash = report.methods.get("cash").unwrap();
    assert_eq!(cash.count, 1);
    assert_eq!(cash.amount, 1100);
    assert_eq!(report.total_paid, order.grand_total);

    // 范围外
    let report = state
        .payment_report(DateRange::new(0, T0 - 1))
        .await
        .unwrap();
    assert!(report.methods.is_empty());
}

// ========== 扫码结账 ==========

#[tokio::test]
async fn test_barcode_checkout_and_replay() {
    let h = create_harness();
    let state = &h.state;

    // 1745 + round(174.5) = 1920
    let order = state
        .orders
        .create_order(1, vec![simple_item(1, 1745)], customer())
        .await
        .unwrap();
    assert_eq!(order.id, 1001);
    assert_eq!(order.grand_total, 1920);

    let token = state.tokens.issue_payment_token(1001, 1920).unwrap();
    let scan = state
        .scan_payment_barcode(&token, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    assert!(!scan.reused);
    assert_eq!(scan.order.payment_status, PaymentStatus::Pending);
    assert_eq!(
        scan.handle.artifact,
        PaymentArtifact::Barcode {
            token: token.clone()
        }
    );

    // 再扫一次复用同一笔支付
    let again = state
        .scan_payment_barcode(&token, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    assert!(again.reused);
    assert_eq!(again.handle.payment_id, scan.handle.payment_id);

    let confirmed = state
        .confirm_barcode_payment(&scan.handle, "STAFF1")
        .await
        .unwrap();
    assert_eq!(confirmed.value.payment_status, PaymentStatus::Paid);
    assert_eq!(
        confirmed.table.map(|t| t.status),
        Some(TableStatus::PaymentCompleted)
    );

    // 重放：令牌仍在有效期内，但状态机拒绝
    for _ in 0..2 {
        let err = state
            .payments
            .complete(&scan.handle, TransitionMeta::by("STAFF1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotPending);
    }
    let err = state
        .scan_payment_barcode(&token, TransitionMeta::by("STAFF1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyPaid);

    let order = state.orders.get_order(1001).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.order_status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_barcode_rejections_leave_state_unchanged() {
    let h = create_harness();
    let state = &h.state;
    let order = state
        .orders
        .create_order(1, vec![simple_item(1, 1745)], customer())
        .await
        .unwrap();
    let history_before = h.store.history_len();

    // 金额不符
    let wrong_amount = state.tokens.issue_payment_token(order.id, 1500).unwrap();
    let err = state
        .scan_payment_barcode(&wrong_amount, TransitionMeta::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmountMismatch);

    // 过期
    let token = state.tokens.issue_payment_token(order.id, 1920).unwrap();
    h.clock.advance(30 * MINUTE + 1);
    let err = state
        .scan_payment_barcode(&token, TransitionMeta::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);
    assert_eq!(AppError::from(err).code, ErrorCode::TokenExpired);

    // 篡改
    let token = state.tokens.issue_payment_token(order.id, 1920).unwrap();
    let forged = token.replacen('.', "X.", 1);
    let err = state
        .scan_payment_barcode(&forged, TransitionMeta::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);

    let order = state.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(h.store.history_len(), history_before);
}

#[tokio::test]
async fn test_barcode_confirm_keeps_table_with_open_orders() {
    let h = create_harness();
    let state = &h.state;
    let first = state
        .orders
        .create_order(1, vec![simple_item(1, 1000)], customer())
        .await
        .unwrap();
    state
        .orders
        .create_order(1, vec![simple_item(1, 300)], customer())
        .await
        .unwrap();

    let handle = state
        .issue_payment_barcode(first.id, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    let confirmed = state
        .confirm_barcode_payment(&handle, "STAFF1")
        .await
        .unwrap();
    assert!(confirmed.table.is_none());
    assert_eq!(
        state.tables.get_table(1).await.unwrap().status,
        TableStatus::Occupied
    );
}

#[tokio::test]
async fn test_cancel_barcode_payment_then_retry() {
    let h = create_harness();
    let state = &h.state;
    let order = state
        .orders
        .create_order(1, vec![simple_item(1, 1745)], customer())
        .await
        .unwrap();

    let handle = state
        .issue_payment_barcode(order.id, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    let rolled_back = state
        .cancel_barcode_payment(&handle, "customer paid by card", TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    assert_eq!(rolled_back.payment_status, PaymentStatus::Unpaid);

    let card = state
        .payments
        .initiate(order.id, PaymentMethod::CreditCard, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    let paid = state.payments.complete(&card, TransitionMeta::by("STAFF1")).await.unwrap();
    assert_eq!(paid.payment_method, Some(PaymentMethod::CreditCard));

    let receipt = state.generate_receipt(order.id).await.unwrap();
    assert!(receipt.receipt_id.starts_with("R-"));
    assert_eq!(receipt.receipt_id.len(), 10);
    assert_eq!(receipt.grand_total, 1920);
    assert_eq!(receipt.table_number, "A1");
    assert_eq!(receipt.payment_method, Some(PaymentMethod::CreditCard));
    assert_eq!(receipt.lines[0].line_total, 1745);
}

// ========== 扫码入座 ==========

#[tokio::test]
async fn test_qr_seating_rules() {
    let h = create_harness();
    let state = &h.state;

    let url = state.table_qr_url(2).unwrap();
    assert!(url.starts_with("https://example.com/customer/?table=2&token="));
    let token = url.split("token=").nth(1).unwrap();

    let first = state.seat_by_qr(token, customer()).await.unwrap();
    assert!(!first.reused_session);
    let second = state.seat_by_qr(token, customer()).await.unwrap();
    assert!(second.reused_session);
    assert_eq!(second.session, first.session);
    assert_eq!(second.table.status, TableStatus::Occupied);

    // 清台中不能入座
    state
        .tables
        .transition(2, TableStatus::Cleaning, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    let err = state.seat_by_qr(token, customer()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTransition);

    // 过期
    state.finish_cleaning(2, "STAFF1").await.unwrap();
    let err = state
        .validate_table_session(&first.session.session_id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    h.clock.advance(24 * 60 * MINUTE + 1);
    let err = state.seat_by_qr(token, customer()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);
    assert_eq!(
        state.tables.get_table(2).await.unwrap().status,
        TableStatus::Available
    );
}

#[tokio::test]
async fn test_order_by_qr() {
    let h = create_harness();
    let state = &h.state;
    let token = state.tokens.issue_table_token(1).unwrap();

    let placed = state
        .order_by_qr(&token, vec![simple_item(3, 250)], customer())
        .await
        .unwrap();
    assert_eq!(placed.value.grand_total, 825);
    assert_eq!(placed.table.map(|t| t.status), Some(TableStatus::Occupied));
}

#[tokio::test]
async fn test_table_session_expiry() {
    let h = create_harness();
    let state = &h.state;
    let token = state.tokens.issue_table_token(1).unwrap();

    let seating = state.seat_by_qr(&token, customer()).await.unwrap();
    let session_id = seating.session.session_id.clone();
    assert_eq!(session_id.len(), 32);
    assert_eq!(seating.session.table_id, 1);
    assert_eq!(seating.session.expires_at, T0 + 12 * 60 * MINUTE);

    // 会话内直接下单
    h.clock.advance(30 * MINUTE);
    let outcome = state
        .order_by_session(&session_id, vec![simple_item(1, 800)], customer())
        .await
        .unwrap();
    assert_eq!(outcome.value.table_id, 1);

    // 12 小时后会话过期，桌台令牌仍有效
    h.clock.advance(12 * 60 * MINUTE);
    let err = state
        .order_by_session(&session_id, vec![simple_item(1, 800)], customer())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    let app: AppError = err.into();
    assert_eq!(app.code, ErrorCode::TableSessionExpired);
    assert_eq!(state.orders.orders_for_table(1).await.unwrap().len(), 1);

    let renewed = state.seat_by_qr(&token, customer()).await.unwrap();
    assert!(!renewed.reused_session);
    assert_ne!(renewed.session.session_id, session_id);
    assert_eq!(renewed.table.status, TableStatus::Occupied);
    assert!(state.validate_table_session(&renewed.session.session_id).is_ok());
}

#[tokio::test]
async fn test_settle_keeps_table_with_late_order() {
    let h = create_harness();
    let state = &h.state;
    state
        .orders
        .create_order(1, vec![simple_item(2, 500)], customer())
        .await
        .unwrap();
    let checkout = state.request_checkout(1, customer()).await.unwrap();

    // 请求结账后追加点单
    let late = state
        .orders
        .create_order(1, vec![simple_item(1, 700)], customer())
        .await
        .unwrap();
    assert_eq!(
        state.tables.get_table(1).await.unwrap().status,
        TableStatus::Occupied
    );

    let settled = state
        .settle_payment_request(&checkout.value.request_id, PaymentMethod::Cash, "STAFF1")
        .await
        .unwrap();
    assert_eq!(settled.value.orders[0].payment_status, PaymentStatus::Paid);
    assert!(settled.table.is_none());
    assert_eq!(
        state.tables.get_table(1).await.unwrap().status,
        TableStatus::Occupied
    );
    let summary = state.payments.table_unpaid_summary(1).await.unwrap();
    assert_eq!(summary.total_amount, late.grand_total);

    // 追加的订单结清后才进入 PaymentCompleted
    let second = state.request_checkout(1, customer()).await.unwrap();
    assert_eq!(second.value.order_ids, vec![late.id]);
    let settled = state
        .settle_payment_request(&second.value.request_id, PaymentMethod::Cash, "STAFF1")
        .await
        .unwrap();
    assert_eq!(
        settled.table.map(|t| t.status),
        Some(TableStatus::PaymentCompleted)
    );
}

#[tokio::test]
async fn test_cancel_checkout_returns_table_to_occupied() {
    let h = create_harness();
    let state = &h.state;
    state
        .orders
        .create_order(1, vec![simple_item(1, 900)], customer())
        .await
        .unwrap();
    let checkout = state.request_checkout(1, customer()).await.unwrap();

    let cancelled = state
        .cancel_checkout(&checkout.value.request_id, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();
    assert_eq!(cancelled.value.request.status, PaymentStatus::Cancelled);
    assert_eq!(cancelled.table.map(|t| t.status), Some(TableStatus::Occupied));

    let summary = state.payments.table_unpaid_summary(1).await.unwrap();
    assert_eq!(summary.total_amount, 990);
}

#[tokio::test]
async fn test_receipt_requires_payment() {
    let h = create_harness();
    let order = h
        .state
        .orders
        .create_order(1, vec![simple_item(1, 900)], customer())
        .await
        .unwrap();

    let err = h.state.generate_receipt(order.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPaid);
}

// ========== 并发 ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirm_settles_once() {
    let h = create_harness();
    let state = h.state.clone();
    let order = state
        .orders
        .create_order(1, vec![simple_item(1, 1745)], customer())
        .await
        .unwrap();
    let handle = state
        .issue_payment_barcode(order.id, TransitionMeta::by("STAFF1"))
        .await
        .unwrap();

    let attempts = (0..8).map(|i| {
        let state = state.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            state
                .payments
                .complete(&handle, TransitionMeta::by(format!("STAFF{}", i)))
                .await
        })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::NotPending)
    );

    let paid_records = h
        .state
        .get_history(EntityType::Order, order.id, DateRange::all())
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.to_state == "paid")
        .count();
    assert_eq!(paid_records, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkout_requests_group_once() {
    let h = create_harness();
    let state = h.state.clone();
    state
        .orders
        .create_order(1, vec![simple_item(2, 500)], customer())
        .await
        .unwrap();

    let attempts = (0..6).map(|_| {
        let state = state.clone();
        tokio::spawn(async move { state.payments.create_request(1, customer()).await })
    });
    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::NoUnpaidOrders)
    );
}

#[tokio::test]
async fn test_failure_maps_to_app_error() {
    let h = create_harness();
    let err = h
        .state
        .tables
        .transition(1, TableStatus::Cleaning, TransitionMeta::new())
        .await
        .unwrap_err();

    let app: AppError = err.into();
    assert_eq!(app.code, ErrorCode::TableIllegalTransition);
    assert_eq!(app.code.category(), ErrorCategory::Table);
    assert!(!app.is_retryable());

    let response = ApiResponse::<()>::error(&app);
    assert_eq!(response.code, Some(7005));
    assert!(response.data.is_none());
    let details = app.details.unwrap();
    assert_eq!(details.get("kind").unwrap(), "illegal_transition");
    assert_eq!(details.get("from").unwrap(), "available");
    assert_eq!(details.get("to").unwrap(), "cleaning");
}
