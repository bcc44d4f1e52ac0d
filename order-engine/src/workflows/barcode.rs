//! 收银台扫码结账
//!
//! ```text
//! scan ─► verify token ─► resolve order ─► amount check ─► initiate (或复用)
//!                                                              │
//!                            confirm ─► complete ─► table PaymentCompleted
//! ```

use super::FlowOutcome;
use crate::audit::TransitionMeta;
use crate::core::EngineState;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use shared::models::{
    Order, OrderStatus, PaymentArtifact, PaymentHandle, PaymentMethod, PaymentStatus,
};

/// A scanned barcode resolved to a pending payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeScan {
    pub order: Order,
    pub handle: PaymentHandle,
    /// true when the order was already pending before this scan
    pub reused: bool,
}

impl EngineState {
    /// Cash barcode for one order (staff prints it or shows it on screen)
    pub async fn issue_payment_barcode(
        &self,
        order_id: i64,
        meta: TransitionMeta,
    ) -> EngineResult<PaymentHandle> {
        self.payments
            .initiate(order_id, PaymentMethod::Cash, meta)
            .await
    }

    /// Staff scans a payment barcode
    ///
    /// Invalid tokens and amount mismatches abort before any mutation.
    pub async fn scan_payment_barcode(
        &self,
        raw: &str,
        meta: TransitionMeta,
    ) -> EngineResult<BarcodeScan> {
        let token = raw.trim();
        let claims = self.tokens.verify_payment_token(token).inspect_err(|e| {
            tracing::warn!(error = %e, "Payment barcode rejected");
        })?;

        let order = self.orders.get_order(claims.order_id).await?;
        if order.payment_status == PaymentStatus::Paid {
            return Err(EngineError::AlreadyPaid(order.id));
        }
        if order.order_status == OrderStatus::Cancelled {
            return Err(EngineError::OrderClosed {
                order_id: order.id,
                status: order.order_status,
            });
        }
        if claims.amount != order.grand_total {
            tracing::warn!(
                order_id = order.id,
                token_amount = claims.amount,
                order_total = order.grand_total,
                "Payment barcode amount mismatch"
            );
            return Err(EngineError::AmountMismatch {
                order_id: order.id,
                token_amount: claims.amount,
                order_total: order.grand_total,
            });
        }

        let barcode = PaymentArtifact::Barcode {
            token: token.to_string(),
        };
        if order.payment_status == PaymentStatus::Pending {
            let mut handle = self
                .payments
                .current_handle(&order)?
                .ok_or_else(|| EngineError::PaymentNotFound(format!("order {}", order.id)))?;
            handle.artifact = barcode;
            return Ok(BarcodeScan {
                order,
                handle,
                reused: true,
            });
        }

        let mut handle = self
            .payments
            .initiate(order.id, PaymentMethod::Cash, meta)
            .await?;
        handle.artifact = barcode;
        let order = self.orders.get_order(order.id).await?;
        Ok(BarcodeScan {
            order,
            handle,
            reused: false,
        })
    }

    /// Staff confirms the cash was received
    ///
    /// The table moves to PaymentCompleted once none of its orders is still
    /// open for payment.
    pub async fn confirm_barcode_payment(
        &self,
        handle: &PaymentHandle,
        staff_id: &str,
    ) -> EngineResult<FlowOutcome<Order>> {
        let meta = TransitionMeta::by(staff_id);
        let order = self.payments.complete(handle, meta.clone()).await?;

        let table = self.complete_table_if_settled(order.table_id, meta).await;
        Ok(FlowOutcome { value: order, table })
    }

    pub async fn cancel_barcode_payment(
        &self,
        handle: &PaymentHandle,
        reason: &str,
        meta: TransitionMeta,
    ) -> EngineResult<Order> {
        self.payments.cancel(handle, reason, meta).await
    }
}
