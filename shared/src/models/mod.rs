//! Data models
//!
//! Shared between the order engine and any presentation layer.
//! Table and order ids are `i64`; payment request ids are strings.
//! Every persisted entity carries a `version` used for optimistic
//! concurrency checks by the store.

pub mod dining_table;
pub mod history;
pub mod order;
pub mod payment;

// Re-exports
pub use dining_table::*;
pub use history::*;
pub use order::*;
pub use payment::*;
