//! Payment Models
//!
//! - [`PaymentRequest`]: groups a table's unpaid orders into one settlement
//! - [`PaymentHandle`]: the in-flight payment returned by `initiate`

use super::order::{PaymentMethod, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Checkout request aggregate (会计请求)
///
/// References orders, does not own them. Resolved atomically: every
/// referenced order moves together or none does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub request_id: String,
    pub table_id: i64,
    pub order_ids: Vec<i64>,
    pub total_amount: i64,
    /// Requested → Paid | Cancelled
    pub status: PaymentStatus,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub version: u64,
}

/// Method-specific proof the customer or staff presents to settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentArtifact {
    /// Signed payment token rendered as a CODE128 barcode (cash at the register)
    Barcode { token: String },
    /// Opaque card transaction reference
    CardTransaction { transaction_id: String },
    /// Deep link opened by the customer's payment app
    MobileDeepLink { url: String },
}

/// Handle of a pending payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentHandle {
    pub payment_id: String,
    pub order_id: i64,
    pub amount: i64,
    pub method: PaymentMethod,
    pub artifact: PaymentArtifact,
    pub created_at: i64,
}
