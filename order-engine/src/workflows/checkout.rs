//! 整桌结账请求

use super::FlowOutcome;
use crate::audit::TransitionMeta;
use crate::core::EngineState;
use crate::error::EngineResult;
use crate::payments::SettledRequest;
use shared::models::{PaymentMethod, PaymentRequest, TableStatus};

impl EngineState {
    /// Customer asks for the bill: group unpaid orders, table → PaymentRequested
    pub async fn request_checkout(
        &self,
        table_id: i64,
        meta: TransitionMeta,
    ) -> EngineResult<FlowOutcome<PaymentRequest>> {
        let request = self.payments.create_request(table_id, meta.clone()).await?;
        let table = self
            .follow_table(table_id, TableStatus::PaymentRequested, meta)
            .await;
        Ok(FlowOutcome {
            value: request,
            table,
        })
    }

    /// Staff settles the request: every order paid
    ///
    /// The table moves to PaymentCompleted only when no order placed after the
    /// request is still open for payment.
    pub async fn settle_payment_request(
        &self,
        request_id: &str,
        method: PaymentMethod,
        staff_id: &str,
    ) -> EngineResult<FlowOutcome<SettledRequest>> {
        let settled = self
            .payments
            .complete_request(request_id, method, staff_id)
            .await?;
        let table = self
            .complete_table_if_settled(settled.request.table_id, TransitionMeta::by(staff_id))
            .await;
        Ok(FlowOutcome {
            value: settled,
            table,
        })
    }

    /// Withdraw the request; a PaymentRequested table goes back to Occupied
    pub async fn cancel_checkout(
        &self,
        request_id: &str,
        meta: TransitionMeta,
    ) -> EngineResult<FlowOutcome<SettledRequest>> {
        let cancelled = self.payments.cancel_request(request_id, meta.clone()).await?;
        let table_id = cancelled.request.table_id;

        let table = match self.tables.get_table(table_id).await {
            Ok(table) if table.status == TableStatus::PaymentRequested => {
                self.follow_table(table_id, TableStatus::Occupied, meta).await
            }
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!(table_id, error = %e, "Table lookup after checkout cancel failed");
                None
            }
        };
        Ok(FlowOutcome {
            value: cancelled,
            table,
        })
    }
}
