//! Shared types for the mobile ordering platform
//!
//! Domain models and the unified error system used by the order engine and
//! by any presentation layer (admin console, customer app, HTTP adapters).

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{
    DateRange, DiningTable, EntityType, ItemStatus, LineItem, LineItemInput, Order, OrderStatus,
    PaymentArtifact, PaymentHandle, PaymentMethod, PaymentRequest, PaymentStatus, TableStatus,
    TransitionField, TransitionRecord,
};
