//! In-memory store
//!
//! A single `RwLock` guards all maps, so a commit is validated and applied
//! without interleaving. Used by tests and by embedders that keep state in
//! process.

use super::{ChangeSet, EntityWrite, HistoryQuery, OrderStore, StorageError, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared::models::{DiningTable, EntityType, Order, PaymentRequest, TransitionRecord};
use std::collections::{BTreeMap, HashMap};

/// 默认起始订单号
const DEFAULT_ORDER_ID_START: i64 = 1001;

#[derive(Debug)]
struct MemoryState {
    tables: BTreeMap<i64, DiningTable>,
    orders: BTreeMap<i64, Order>,
    requests: HashMap<String, PaymentRequest>,
    history: Vec<TransitionRecord>,
    next_table_id: i64,
    next_order_id: i64,
}

/// [`OrderStore`] kept in process memory
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_order_id_start(DEFAULT_ORDER_ID_START)
    }

    pub fn with_order_id_start(start: i64) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                tables: BTreeMap::new(),
                orders: BTreeMap::new(),
                requests: HashMap::new(),
                history: Vec::new(),
                next_table_id: 1,
                next_order_id: start,
            }),
        }
    }

    /// Seed a table as-is (no history record)
    pub fn seed_table(&self, table: DiningTable) {
        let mut state = self.state.write();
        state.next_table_id = state.next_table_id.max(table.id + 1);
        state.tables.insert(table.id, table);
    }

    /// Seed an order as-is; the id counter moves past it
    pub fn seed_order(&self, order: Order) {
        let mut state = self.state.write();
        state.next_order_id = state.next_order_id.max(order.id + 1);
        state.orders.insert(order.id, order);
    }

    pub fn history_len(&self) -> usize {
        self.state.read().history.len()
    }
}

fn not_found(entity: EntityType, id: impl ToString) -> StorageError {
    StorageError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn check_version(
    entity: EntityType,
    id: impl ToString,
    stored: Option<u64>,
    written: u64,
) -> StorageResult<()> {
    match stored {
        None => Err(not_found(entity, id)),
        Some(found) if found != written => Err(StorageError::Conflict {
            entity,
            id: id.to_string(),
            expected: written,
            found,
        }),
        Some(_) => Ok(()),
    }
}

fn check_absent(entity: EntityType, id: impl ToString, exists: bool) -> StorageResult<()> {
    if exists {
        return Err(StorageError::AlreadyExists {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

impl MemoryState {
    /// 先全部校验，再统一写入
    fn validate(&self, writes: &[EntityWrite]) -> StorageResult<()> {
        for write in writes {
            match write {
                EntityWrite::InsertTable(t) => {
                    check_absent(EntityType::Table, t.id, self.tables.contains_key(&t.id))?
                }
                EntityWrite::UpdateTable(t) => check_version(
                    EntityType::Table,
                    t.id,
                    self.tables.get(&t.id).map(|s| s.version),
                    t.version,
                )?,
                EntityWrite::InsertOrder(o) => {
                    check_absent(EntityType::Order, o.id, self.orders.contains_key(&o.id))?
                }
                EntityWrite::UpdateOrder(o) => check_version(
                    EntityType::Order,
                    o.id,
                    self.orders.get(&o.id).map(|s| s.version),
                    o.version,
                )?,
                EntityWrite::InsertPaymentRequest(r) => check_absent(
                    EntityType::PaymentRequest,
                    &r.request_id,
                    self.requests.contains_key(&r.request_id),
                )?,
                EntityWrite::UpdatePaymentRequest(r) => check_version(
                    EntityType::PaymentRequest,
                    &r.request_id,
                    self.requests.get(&r.request_id).map(|s| s.version),
                    r.version,
                )?,
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: EntityWrite) {
        match write {
            EntityWrite::InsertTable(t) => {
                self.next_table_id = self.next_table_id.max(t.id + 1);
                self.tables.insert(t.id, t);
            }
            EntityWrite::UpdateTable(mut t) => {
                t.version += 1;
                self.tables.insert(t.id, t);
            }
            EntityWrite::InsertOrder(o) => {
                self.next_order_id = self.next_order_id.max(o.id + 1);
                self.orders.insert(o.id, o);
            }
            EntityWrite::UpdateOrder(mut o) => {
                o.version += 1;
                self.orders.insert(o.id, o);
            }
            EntityWrite::InsertPaymentRequest(r) => {
                self.requests.insert(r.request_id.clone(), r);
            }
            EntityWrite::UpdatePaymentRequest(mut r) => {
                r.version += 1;
                self.requests.insert(r.request_id.clone(), r);
            }
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_table(&self, id: i64) -> StorageResult<DiningTable> {
        self.state
            .read()
            .tables
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityType::Table, id))
    }

    async fn list_tables(&self) -> StorageResult<Vec<DiningTable>> {
        Ok(self.state.read().tables.values().cloned().collect())
    }

    async fn next_table_id(&self) -> StorageResult<i64> {
        let mut state = self.state.write();
        let id = state.next_table_id;
        state.next_table_id += 1;
        Ok(id)
    }

    async fn get_order(&self, id: i64) -> StorageResult<Order> {
        self.state
            .read()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityType::Order, id))
    }

    async fn orders_for_table(&self, table_id: i64) -> StorageResult<Vec<Order>> {
        Ok(self
            .state
            .read()
            .orders
            .values()
            .filter(|o| o.table_id == table_id)
            .cloned()
            .collect())
    }

    async fn next_order_id(&self) -> StorageResult<i64> {
        let mut state = self.state.write();
        let id = state.next_order_id;
        state.next_order_id += 1;
        Ok(id)
    }

    async fn get_payment_request(&self, request_id: &str) -> StorageResult<PaymentRequest> {
        self.state
            .read()
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| not_found(EntityType::PaymentRequest, request_id))
    }

    async fn commit(&self, changes: ChangeSet) -> StorageResult<()> {
        let (writes, records) = changes.into_parts();
        let mut state = self.state.write();
        state.validate(&writes)?;
        for write in writes {
            state.apply(write);
        }
        state.history.extend(records);
        Ok(())
    }

    async fn history(&self, query: &HistoryQuery) -> StorageResult<Vec<TransitionRecord>> {
        Ok(self
            .state
            .read()
            .history
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }
}
