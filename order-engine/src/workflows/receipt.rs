//! 小票

use crate::core::EngineState;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use shared::models::{PaymentMethod, PaymentStatus};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

/// Receipt of a paid order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// R-XXXXXXXX
    pub receipt_id: String,
    pub store_name: String,
    pub order_id: i64,
    pub table_id: i64,
    pub table_number: String,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub grand_total: i64,
    pub payment_method: Option<PaymentMethod>,
    pub payment_id: Option<String>,
    pub paid_at: Option<i64>,
    pub issued_at: i64,
}

impl EngineState {
    pub async fn generate_receipt(&self, order_id: i64) -> EngineResult<Receipt> {
        let order = self.orders.get_order(order_id).await?;
        if order.payment_status != PaymentStatus::Paid {
            return Err(EngineError::NotPaid {
                order_id,
                status: order.payment_status,
            });
        }
        let table = self.tables.get_table(order.table_id).await?;

        let uuid = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        let receipt = Receipt {
            receipt_id: format!("R-{}", &uuid[..8]),
            store_name: self.config.store_name.clone(),
            order_id,
            table_id: table.id,
            table_number: table.number,
            lines: order
                .line_items
                .iter()
                .map(|item| ReceiptLine {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price_at_order_time,
                    line_total: item.line_total,
                })
                .collect(),
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            grand_total: order.grand_total,
            payment_method: order.payment_method,
            payment_id: order.payment_id,
            paid_at: order.completed_at,
            issued_at: self.clock.now_millis(),
        };

        tracing::info!(order_id, receipt_id = %receipt.receipt_id, "Receipt generated");
        Ok(receipt)
    }
}
