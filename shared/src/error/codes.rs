//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Token errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 7xxx: Table errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,

    // ==================== 1xxx: Token ====================
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid (malformed, forged, wrong subject)
    TokenInvalid = 1004,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order is completed or cancelled
    OrderClosed = 4003,
    /// Order line item not found
    OrderItemNotFound = 4006,
    /// Order has no line items
    OrderEmpty = 4007,
    /// Line item quantity or price out of range
    OrderInvalidLineItem = 4008,
    /// Order status transition not allowed
    OrderIllegalTransition = 4009,
    /// Order has not been paid yet
    OrderNotPaid = 4010,

    // ==================== 5xxx: Payment ====================
    /// Scanned amount differs from the order total
    PaymentAmountMismatch = 5006,
    /// Payment is not pending
    PaymentNotPending = 5007,
    /// Payment handle does not match the active payment
    PaymentNotFound = 5008,
    /// Table has no unpaid orders
    NoUnpaidOrders = 5009,
    /// Payment request not found
    PaymentRequestNotFound = 5010,
    /// Payment status transition not allowed
    PaymentIllegalTransition = 5011,

    // ==================== 7xxx: Table ====================
    /// Table not found
    TableNotFound = 7001,
    /// Table status transition not allowed
    TableIllegalTransition = 7005,
    /// Table session not found or already closed
    TableSessionNotFound = 7006,
    /// Table session has expired
    TableSessionExpired = 7007,

    // ==================== 9xxx: System ====================
    /// Storage error
    StorageError = 9002,
    /// Configuration error
    ConfigError = 9005,
    /// Entity changed concurrently, retry
    ConcurrentModification = 9405,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether the caller may retry the same request and expect a different outcome
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::StorageError | ErrorCode::ConcurrentModification
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",

            // Token
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderClosed => "Order is already closed",
            ErrorCode::OrderItemNotFound => "Order item not found",
            ErrorCode::OrderEmpty => "Order has no items",
            ErrorCode::OrderInvalidLineItem => "Order item is invalid",
            ErrorCode::OrderIllegalTransition => "Order status change is not allowed",
            ErrorCode::OrderNotPaid => "Order has not been paid",

            // Payment
            ErrorCode::PaymentAmountMismatch => "Payment amount does not match the order total",
            ErrorCode::PaymentNotPending => "Payment is not pending",
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::NoUnpaidOrders => "Table has no unpaid orders",
            ErrorCode::PaymentRequestNotFound => "Payment request not found",
            ErrorCode::PaymentIllegalTransition => "Payment status change is not allowed",

            // Table
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::TableIllegalTransition => "Table status change is not allowed",
            ErrorCode::TableSessionNotFound => "Table session not found",
            ErrorCode::TableSessionExpired => "Table session has expired",

            // System
            ErrorCode::StorageError => "Storage error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ConcurrentModification => "Data changed concurrently, please retry",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),

            // Token
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::OrderClosed),
            4006 => Ok(ErrorCode::OrderItemNotFound),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::OrderInvalidLineItem),
            4009 => Ok(ErrorCode::OrderIllegalTransition),
            4010 => Ok(ErrorCode::OrderNotPaid),

            // Payment
            5006 => Ok(ErrorCode::PaymentAmountMismatch),
            5007 => Ok(ErrorCode::PaymentNotPending),
            5008 => Ok(ErrorCode::PaymentNotFound),
            5009 => Ok(ErrorCode::NoUnpaidOrders),
            5010 => Ok(ErrorCode::PaymentRequestNotFound),
            5011 => Ok(ErrorCode::PaymentIllegalTransition),

            // Table
            7001 => Ok(ErrorCode::TableNotFound),
            7005 => Ok(ErrorCode::TableIllegalTransition),
            7006 => Ok(ErrorCode::TableSessionNotFound),
            7007 => Ok(ErrorCode::TableSessionExpired),

            // System
            9002 => Ok(ErrorCode::StorageError),
            9005 => Ok(ErrorCode::ConfigError),
            9405 => Ok(ErrorCode::ConcurrentModification),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
