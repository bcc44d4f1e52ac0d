//! Engine errors
//!
//! Every domain failure is a typed [`EngineError`] variant so callers can
//! branch on the specific kind. [`EngineError::kind`] gives the stable
//! machine-readable name, and `From<EngineError> for AppError` maps it onto
//! the shared numeric error codes.

use crate::storage::StorageError;
use crate::tokens::TokenError;
use shared::error::{AppError, ErrorCode};
use shared::models::{EntityType, OrderStatus, PaymentStatus};
use std::fmt;
use thiserror::Error;

/// Which state machine rejected a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionScope {
    Table,
    OrderStatus,
    PaymentStatus,
    PaymentRequest,
}

impl TransitionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::OrderStatus => "order",
            Self::PaymentStatus => "payment",
            Self::PaymentRequest => "payment request",
        }
    }
}

impl fmt::Display for TransitionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IllegalTransition,
    InvalidToken,
    AmountMismatch,
    NotPending,
    AlreadyPaid,
    OrderClosed,
    NoUnpaidOrders,
    EmptyOrder,
    InvalidLineItem,
    ItemNotFound,
    PaymentNotFound,
    NotPaid,
    SessionNotFound,
    SessionExpired,
    ConcurrentModification,
    NotFound,
    StorageError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IllegalTransition => "illegal_transition",
            Self::InvalidToken => "invalid_token",
            Self::AmountMismatch => "amount_mismatch",
            Self::NotPending => "not_pending",
            Self::AlreadyPaid => "already_paid",
            Self::OrderClosed => "order_closed",
            Self::NoUnpaidOrders => "no_unpaid_orders",
            Self::EmptyOrder => "empty_order",
            Self::InvalidLineItem => "invalid_line_item",
            Self::ItemNotFound => "item_not_found",
            Self::PaymentNotFound => "payment_not_found",
            Self::NotPaid => "not_paid",
            Self::SessionNotFound => "session_not_found",
            Self::SessionExpired => "session_expired",
            Self::ConcurrentModification => "concurrent_modification",
            Self::NotFound => "not_found",
            Self::StorageError => "storage_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain failure of an engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Illegal {scope} transition: {from} -> {to}")]
    IllegalTransition {
        scope: TransitionScope,
        from: String,
        to: String,
    },

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Amount mismatch on order {order_id}: token {token_amount}, order total {order_total}")]
    AmountMismatch {
        order_id: i64,
        token_amount: i64,
        order_total: i64,
    },

    #[error("Payment of order {order_id} is not pending (current: {status})")]
    NotPending {
        order_id: i64,
        status: PaymentStatus,
    },

    #[error("Order already paid: {0}")]
    AlreadyPaid(i64),

    #[error("Order {order_id} is closed ({status})")]
    OrderClosed { order_id: i64, status: OrderStatus },

    #[error("Table {0} has no unpaid orders")]
    NoUnpaidOrders(i64),

    #[error("Order has no line items")]
    EmptyOrder,

    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    #[error("Line item {index} not found on order {order_id}")]
    ItemNotFound { order_id: i64, index: usize },

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Order {order_id} is not paid (current: {status})")]
    NotPaid {
        order_id: i64,
        status: PaymentStatus,
    },

    #[error("Table session not found: {0}")]
    SessionNotFound(String),

    #[error("Table session {session_id} expired at {expired_at}")]
    SessionExpired { session_id: String, expired_at: i64 },

    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: EntityType, id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityType, id: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn illegal(scope: TransitionScope, from: impl ToString, to: impl ToString) -> Self {
        Self::IllegalTransition {
            scope,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
            Self::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            Self::NotPending { .. } => ErrorKind::NotPending,
            Self::AlreadyPaid(_) => ErrorKind::AlreadyPaid,
            Self::OrderClosed { .. } => ErrorKind::OrderClosed,
            Self::NoUnpaidOrders(_) => ErrorKind::NoUnpaidOrders,
            Self::EmptyOrder => ErrorKind::EmptyOrder,
            Self::InvalidLineItem(_) => ErrorKind::InvalidLineItem,
            Self::ItemNotFound { .. } => ErrorKind::ItemNotFound,
            Self::PaymentNotFound(_) => ErrorKind::PaymentNotFound,
            Self::NotPaid { .. } => ErrorKind::NotPaid,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::SessionExpired { .. } => ErrorKind::SessionExpired,
            Self::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::StorageError,
        }
    }

    /// Only transient storage trouble is worth retrying with the same input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StorageError | ErrorKind::ConcurrentModification
        )
    }

    /// Numeric code in the shared error system
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::IllegalTransition { scope, .. } => match scope {
                TransitionScope::Table => ErrorCode::TableIllegalTransition,
                TransitionScope::OrderStatus => ErrorCode::OrderIllegalTransition,
                TransitionScope::PaymentStatus | TransitionScope::PaymentRequest => {
                    ErrorCode::PaymentIllegalTransition
                }
            },
            Self::InvalidToken(TokenError::Expired { .. }) => ErrorCode::TokenExpired,
            Self::InvalidToken(_) => ErrorCode::TokenInvalid,
            Self::AmountMismatch { .. } => ErrorCode::PaymentAmountMismatch,
            Self::NotPending { .. } => ErrorCode::PaymentNotPending,
            Self::AlreadyPaid(_) => ErrorCode::OrderAlreadyPaid,
            Self::OrderClosed { .. } => ErrorCode::OrderClosed,
            Self::NoUnpaidOrders(_) => ErrorCode::NoUnpaidOrders,
            Self::EmptyOrder => ErrorCode::OrderEmpty,
            Self::InvalidLineItem(_) => ErrorCode::OrderInvalidLineItem,
            Self::ItemNotFound { .. } => ErrorCode::OrderItemNotFound,
            Self::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            Self::NotPaid { .. } => ErrorCode::OrderNotPaid,
            Self::SessionNotFound(_) => ErrorCode::TableSessionNotFound,
            Self::SessionExpired { .. } => ErrorCode::TableSessionExpired,
            Self::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            Self::NotFound { entity, .. } => match entity {
                EntityType::Table => ErrorCode::TableNotFound,
                EntityType::Order => ErrorCode::OrderNotFound,
                EntityType::PaymentRequest => ErrorCode::PaymentRequestNotFound,
            },
            Self::Storage(_) => ErrorCode::StorageError,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => Self::NotFound { entity, id },
            StorageError::Conflict { entity, id, .. }
            | StorageError::AlreadyExists { entity, id } => {
                Self::ConcurrentModification { entity, id }
            }
            StorageError::Backend(msg) => {
                tracing::error!(error = %msg, "Storage backend failure");
                Self::Storage(msg)
            }
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let app = AppError::with_message(err.code(), err.to_string())
            .with_detail("kind", err.kind().as_str())
            .with_detail("retryable", err.is_retryable());

        match &err {
            EngineError::IllegalTransition { scope, from, to } => app
                .with_detail("scope", scope.as_str())
                .with_detail("from", from.as_str())
                .with_detail("to", to.as_str()),
            EngineError::AmountMismatch {
                order_id,
                token_amount,
                order_total,
            } => app
                .with_detail("order_id", *order_id)
                .with_detail("token_amount", *token_amount)
                .with_detail("order_total", *order_total),
            EngineError::NotPending { order_id, status }
            | EngineError::NotPaid { order_id, status } => app
                .with_detail("order_id", *order_id)
                .with_detail("status", status.as_str()),
            EngineError::AlreadyPaid(order_id) => app.with_detail("order_id", *order_id),
            EngineError::OrderClosed { order_id, status } => app
                .with_detail("order_id", *order_id)
                .with_detail("status", status.as_str()),
            EngineError::NoUnpaidOrders(table_id) => app.with_detail("table_id", *table_id),
            EngineError::ItemNotFound { order_id, index } => app
                .with_detail("order_id", *order_id)
                .with_detail("index", *index),
            EngineError::PaymentNotFound(payment_id) => {
                app.with_detail("payment_id", payment_id.as_str())
            }
            EngineError::SessionNotFound(session_id) => {
                app.with_detail("session_id", session_id.as_str())
            }
            EngineError::SessionExpired {
                session_id,
                expired_at,
            } => app
                .with_detail("session_id", session_id.as_str())
                .with_detail("expired_at", *expired_at),
            EngineError::ConcurrentModification { entity, id }
            | EngineError::NotFound { entity, id } => app
                .with_detail("entity", entity.as_str())
                .with_detail("id", id.as_str()),
            _ => app,
        }
    }
}
