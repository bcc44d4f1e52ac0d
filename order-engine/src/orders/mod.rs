//! Order Lifecycle (订单生命周期)
//!
//! - [`money`]: line item validation and tax/total computation
//! - [`lifecycle`]: immutable order snapshots, fulfillment status, cancellation
//!
//! # 订单状态
//!
//! ```text
//! Pending ──► Processing ──► Completed
//!    │            │
//!    └────────────┴──► Cancelled        (cancel_order)
//! Pending ──────────────► Completed
//! ```
//!
//! Completed and Cancelled are terminal.

pub mod lifecycle;
pub mod money;

pub use lifecycle::{OrderLifecycle, can_advance};
pub use money::{OrderTotals, compute_tax, compute_totals, validate_line_item};
