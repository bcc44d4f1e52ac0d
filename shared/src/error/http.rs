//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::OrderNotFound
            | Self::OrderItemNotFound
            | Self::PaymentNotFound
            | Self::PaymentRequestNotFound
            | Self::TableNotFound
            | Self::TableSessionNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::OrderAlreadyPaid
            | Self::OrderClosed
            | Self::PaymentNotPending
            | Self::ConcurrentModification => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::TokenExpired | Self::TokenInvalid | Self::TableSessionExpired => {
                StatusCode::UNAUTHORIZED
            }

            // 422 Unprocessable (business rule rejected a well-formed request)
            Self::OrderIllegalTransition
            | Self::PaymentIllegalTransition
            | Self::TableIllegalTransition
            | Self::PaymentAmountMismatch
            | Self::OrderNotPaid
            | Self::NoUnpaidOrders => StatusCode::UNPROCESSABLE_ENTITY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::StorageError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
