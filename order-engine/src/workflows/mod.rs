//! Orchestration (业务流程编排)
//!
//! Compound operations over the three state machines, as methods on
//! [`EngineState`]:
//!
//! - [`seating`]: table QR issue and self-seating
//! - [`checkout`]: table payment requests
//! - [`barcode`]: staff barcode scan, confirm, cancel
//! - [`housekeeping`]: cleaning after payment
//! - [`receipt`]: receipts for paid orders
//! - [`reporting`]: history and aggregated reports
//!
//! Once a payment has committed, the table follow-up transition is
//! best-effort: a rejected edge is logged and the payment result still
//! returns.

pub mod barcode;
pub mod checkout;
pub mod housekeeping;
pub mod receipt;
pub mod reporting;
pub mod seating;

pub use barcode::BarcodeScan;
pub use receipt::{Receipt, ReceiptLine};
pub use seating::SeatingOutcome;

use crate::audit::TransitionMeta;
use crate::core::EngineState;
use serde::{Deserialize, Serialize};
use shared::models::{DiningTable, Order, TableStatus};

/// Workflow result plus the table after its follow-up transition
///
/// `table` is `None` when the follow-up was skipped or rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowOutcome<T> {
    pub value: T,
    pub table: Option<DiningTable>,
}

impl EngineState {
    /// Best-effort table transition following a committed payment step
    pub(crate) async fn follow_table(
        &self,
        table_id: i64,
        to: TableStatus,
        meta: TransitionMeta,
    ) -> Option<DiningTable> {
        match self.tables.transition(table_id, to, meta).await {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!(
                    table_id,
                    to = %to,
                    error = %e,
                    "Table follow-up transition skipped"
                );
                None
            }
        }
    }

    /// Table → PaymentCompleted once none of its orders is still open for payment
    pub(crate) async fn complete_table_if_settled(
        &self,
        table_id: i64,
        meta: TransitionMeta,
    ) -> Option<DiningTable> {
        let open = match self.orders.orders_for_table(table_id).await {
            Ok(orders) => orders.iter().any(Order::is_open_for_payment),
            Err(e) => {
                tracing::warn!(table_id, error = %e, "Open order lookup failed");
                true
            }
        };
        if open {
            tracing::debug!(table_id, "Table still has open orders");
            return None;
        }
        self.follow_table(table_id, TableStatus::PaymentCompleted, meta)
            .await
    }
}
