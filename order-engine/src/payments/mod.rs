//! Payment State Machine (支付状态机)
//!
//! # 支付状态
//!
//! ```text
//! Unpaid ──► Requested ──► Pending ──► Paid
//!    ▲           │            │
//!    └───────────┘            ▼
//!    ▲                     Failed ──► Pending (retry)
//!    └────────────────────────┘
//! ```
//!
//! Paid, Refunded and Cancelled are terminal. `Paid` is reachable only from
//! `Pending`, which forces the two-phase initiate / complete protocol.
//! Cancelling an order moves Unpaid/Requested/Failed to Cancelled outside this
//! graph (see [`crate::orders::OrderLifecycle::cancel_order`]).

pub mod artifact;
mod machine;
mod service;

pub use machine::{allowed_targets, can_transition};
pub use service::{PaymentStateMachine, SettledRequest, UnpaidOrder, UnpaidSummary};
