//! Order Model
//!
//! An order is an immutable snapshot of what the customer confirmed: line
//! items and unit prices are fixed at creation, later menu price changes never
//! reach an existing order. Only the status fields move afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order-level fulfillment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Completed and Cancelled accept no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical payment status, shared by orders and payment requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    /// 已加入结账请求
    Requested,
    /// 支付进行中（已出条码/交易号）
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Refunded | Self::Cancelled)
    }

    /// Still owes money (counted by unpaid summaries)
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Unpaid | Self::Requested)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Requested => "requested",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item kitchen fulfillment status (forward only)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Served,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Served => "served",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method chosen at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    MobilePayment,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::CreditCard => "credit_card",
            Self::MobilePayment => "mobile_payment",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "credit_card" | "card" => Ok(Self::CreditCard),
            "mobile_payment" | "mobile" => Ok(Self::MobilePayment),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// Line item as submitted from the customer's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub menu_item_id: i64,
    pub name: String,
    pub quantity: i32,
    /// Menu price at the moment of ordering, in minor currency units
    pub unit_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Line item snapshot stored on the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub menu_item_id: i64,
    pub name: String,
    pub quantity: i32,
    pub unit_price_at_order_time: i64,
    /// quantity × unit_price_at_order_time
    pub line_total: i64,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub table_id: i64,
    pub line_items: Vec<LineItem>,
    pub subtotal: i64,
    pub tax_amount: i64,
    pub grand_total: i64,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    /// Id of the active (pending) or settling payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub version: u64,
}

impl Order {
    /// Unpaid, requested or mid-payment: the table still has business with this order
    pub fn is_open_for_payment(&self) -> bool {
        self.order_status != OrderStatus::Cancelled
            && matches!(
                self.payment_status,
                PaymentStatus::Unpaid
                    | PaymentStatus::Requested
                    | PaymentStatus::Pending
                    | PaymentStatus::Failed
            )
    }
}
