//! Unified error system for the ordering platform
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized numeric error codes
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified response envelope for collaborators
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Token errors (QR / barcode)
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 7xxx: Table errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::OrderNotFound);
//!
//! let err = AppError::with_message(ErrorCode::PaymentNotPending, "Order 1001 is not pending")
//!     .with_detail("order_id", 1001);
//!
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(5007));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
