//! Table State Machine (桌台状态机)
//!
//! ```text
//! Available ──► Occupied ──► PaymentRequested ──► PaymentCompleted ──► Cleaning ──► Available
//!    │  ▲          │  ▲             │                    ▲                 │
//!    │  └──────────┘  └─────────────┘                    │                 ▼
//!    ▼                └──────────────────────────────────┘            Maintenance
//! Reserved / Maintenance
//! ```
//!
//! See [`allowed_targets`] for the full edge list. The machine does not know
//! why a transition happens; callers supply the target status.

mod machine;

pub use machine::{TablePlan, TableStateMachine, allowed_targets, can_transition, plan_transition};
