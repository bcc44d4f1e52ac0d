//! 状态变更履历
//!
//! Every committed transition appends an immutable
//! [`TransitionRecord`](shared::models::TransitionRecord) through the store.
//! This module holds the caller-supplied metadata and the report builders
//! that read the log back.

mod meta;
pub mod report;

pub use meta::TransitionMeta;
pub use report::{MethodSummary, PaymentReport, TableStatusReport};
