//! Persistence port (持久化端口)
//!
//! The engine never assumes a storage engine. It reads entities through
//! [`OrderStore`] and writes through [`OrderStore::commit`], which applies a
//! [`ChangeSet`] atomically under optimistic version checks.
//!
//! # Versioning
//!
//! | Write | Requirement | Stored as |
//! |-------|-------------|-----------|
//! | insert | id not present | `version` as given |
//! | update | stored `version` == written `version` | `version + 1` |
//!
//! Any violated requirement rejects the whole change set.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use shared::models::{DateRange, DiningTable, EntityType, Order, PaymentRequest, TransitionRecord};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityType, id: String },

    #[error("Version conflict on {entity} {id}: expected {expected}, found {found}")]
    Conflict {
        entity: EntityType,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: EntityType, id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One entity write inside a [`ChangeSet`]
#[derive(Debug, Clone)]
pub enum EntityWrite {
    InsertTable(DiningTable),
    UpdateTable(DiningTable),
    InsertOrder(Order),
    UpdateOrder(Order),
    InsertPaymentRequest(PaymentRequest),
    UpdatePaymentRequest(PaymentRequest),
}

/// Entity writes and history records committed together
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    writes: Vec<EntityWrite>,
    records: Vec<TransitionRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, table: DiningTable) -> &mut Self {
        self.writes.push(EntityWrite::InsertTable(table));
        self
    }

    pub fn update_table(&mut self, table: DiningTable) -> &mut Self {
        self.writes.push(EntityWrite::UpdateTable(table));
        self
    }

    pub fn insert_order(&mut self, order: Order) -> &mut Self {
        self.writes.push(EntityWrite::InsertOrder(order));
        self
    }

    pub fn update_order(&mut self, order: Order) -> &mut Self {
        self.writes.push(EntityWrite::UpdateOrder(order));
        self
    }

    pub fn insert_payment_request(&mut self, request: PaymentRequest) -> &mut Self {
        self.writes.push(EntityWrite::InsertPaymentRequest(request));
        self
    }

    pub fn update_payment_request(&mut self, request: PaymentRequest) -> &mut Self {
        self.writes.push(EntityWrite::UpdatePaymentRequest(request));
        self
    }

    pub fn record(&mut self, record: TransitionRecord) -> &mut Self {
        self.records.push(record);
        self
    }

    pub fn writes(&self) -> &[EntityWrite] {
        &self.writes
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.records.is_empty()
    }

    pub fn into_parts(self) -> (Vec<EntityWrite>, Vec<TransitionRecord>) {
        (self.writes, self.records)
    }
}

/// History filter; `None` matches everything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub range: DateRange,
}

impl HistoryQuery {
    pub fn all() -> Self {
        Self {
            entity_type: None,
            entity_id: None,
            range: DateRange::all(),
        }
    }

    pub fn for_entity(entity_type: EntityType, entity_id: impl ToString) -> Self {
        Self {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id.to_string()),
            range: DateRange::all(),
        }
    }

    pub fn in_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn matches(&self, record: &TransitionRecord) -> bool {
        self.entity_type.is_none_or(|t| t == record.entity_type)
            && self
                .entity_id
                .as_deref()
                .is_none_or(|id| id == record.entity_id)
            && self.range.contains(record.timestamp)
    }
}

/// Asynchronous persistence collaborator
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_table(&self, id: i64) -> StorageResult<DiningTable>;

    /// Ordered by table id
    async fn list_tables(&self) -> StorageResult<Vec<DiningTable>>;

    /// Reserve a fresh table id; never hands out the same id twice
    async fn next_table_id(&self) -> StorageResult<i64>;

    async fn get_order(&self, id: i64) -> StorageResult<Order>;

    /// Every order of the table, oldest first
    async fn orders_for_table(&self, table_id: i64) -> StorageResult<Vec<Order>>;

    /// Reserve a fresh order id; never hands out the same id twice
    async fn next_order_id(&self) -> StorageResult<i64>;

    async fn get_payment_request(&self, request_id: &str) -> StorageResult<PaymentRequest>;

    /// Apply all writes and records atomically
    async fn commit(&self, changes: ChangeSet) -> StorageResult<()>;

    /// Append one record outside of an entity write
    async fn append_history(&self, record: TransitionRecord) -> StorageResult<()> {
        let mut changes = ChangeSet::new();
        changes.record(record);
        self.commit(changes).await
    }

    /// Matching records in append order
    async fn history(&self, query: &HistoryQuery) -> StorageResult<Vec<TransitionRecord>>;
}
