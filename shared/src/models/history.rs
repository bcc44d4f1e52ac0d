//! Transition history (状态变更履历)
//!
//! Append-only audit entries written for every state change of a table,
//! order or payment request. Never mutated or deleted.

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of entity a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Table,
    Order,
    PaymentRequest,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Order => "order",
            Self::PaymentRequest => "payment_request",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which state field of the entity moved
///
/// Orders carry two machines (fulfillment and payment) whose state names
/// overlap (`pending`, `cancelled`), so the record says which one changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionField {
    #[default]
    Status,
    PaymentStatus,
}

/// Immutable audit entry for one state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(default)]
    pub field: TransitionField,
    pub from_state: String,
    pub to_state: String,
    /// Unix millis
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransitionRecord {
    pub fn new(
        entity_type: EntityType,
        entity_id: impl ToString,
        from_state: impl ToString,
        to_state: impl ToString,
        timestamp: i64,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            field: TransitionField::Status,
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            timestamp,
            actor: None,
            note: None,
        }
    }

    /// Mark the record as a payment-status change
    pub fn for_payment(mut self) -> Self {
        self.field = TransitionField::PaymentStatus;
        self
    }

    pub fn is_payment(&self) -> bool {
        self.field == TransitionField::PaymentStatus
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Idempotent request to the current state
    pub fn is_no_op(&self) -> bool {
        self.from_state == self.to_state
    }
}

/// Inclusive time window in Unix millis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

impl DateRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Everything, for unfiltered queries
    pub fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// One UTC calendar day, 00:00:00.000 through 23:59:59.999
    pub fn day(date: NaiveDate) -> Self {
        let start = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
            .unwrap_or_default();
        Self {
            start,
            end: start + 24 * 60 * 60 * 1000 - 1,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
