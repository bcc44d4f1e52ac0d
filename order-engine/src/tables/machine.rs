use crate::audit::TransitionMeta;
use crate::error::{EngineError, EngineResult, TransitionScope};
use crate::locks::{EntityKey, EntityLocks};
use crate::storage::{ChangeSet, OrderStore};
use crate::utils::Clock;
use shared::models::{DiningTable, EntityType, TableStatus, TransitionRecord};
use std::fmt;
use std::sync::Arc;

/// Legal targets from `from`, excluding the idempotent self-transition
pub fn allowed_targets(from: TableStatus) -> &'static [TableStatus] {
    use TableStatus::*;
    match from {
        Available => &[Occupied, Reserved, Maintenance],
        Occupied => &[
            PaymentRequested,
            PaymentCompleted,
            Cleaning,
            Available,
            Maintenance,
        ],
        PaymentRequested => &[PaymentCompleted, Occupied],
        PaymentCompleted => &[Cleaning],
        Cleaning => &[Available, Maintenance],
        Reserved => &[Occupied, Available, Maintenance],
        Maintenance => &[Available],
    }
}

pub fn can_transition(from: TableStatus, to: TableStatus) -> bool {
    from == to || allowed_targets(from).contains(&to)
}

/// Planned (not yet committed) table change
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: DiningTable,
    pub record: TransitionRecord,
    /// false for a no-op
    pub changed: bool,
}

impl TablePlan {
    /// Push the plan into a change set; returns the table as it will be stored
    pub fn stage(self, changes: &mut ChangeSet) -> DiningTable {
        changes.record(self.record);
        if !self.changed {
            return self.table;
        }
        let mut stored = self.table.clone();
        changes.update_table(self.table);
        stored.version += 1;
        stored
    }
}

/// Decide a transition without touching storage
pub fn plan_transition(
    table: &DiningTable,
    to: TableStatus,
    meta: &TransitionMeta,
    now: i64,
) -> EngineResult<TablePlan> {
    let from = table.status;
    let record = TransitionRecord::new(EntityType::Table, table.id, from, to, now);

    if from == to {
        return Ok(TablePlan {
            table: table.clone(),
            record: meta.stamp(record.with_note(Some("no-op".into()))),
            changed: false,
        });
    }
    if !allowed_targets(from).contains(&to) {
        return Err(EngineError::illegal(TransitionScope::Table, from, to));
    }

    let mut updated = table.clone();
    updated.status = to;
    updated.last_transition_at = now;
    updated.last_updated_by = meta.actor.clone();
    updated.status_note = meta.note.clone();

    Ok(TablePlan {
        table: updated,
        record: meta.stamp(record),
        changed: true,
    })
}

/// Serialized, persisted table transitions
pub struct TableStateMachine {
    store: Arc<dyn OrderStore>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TableStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStateMachine").finish_non_exhaustive()
    }
}

impl TableStateMachine {
    pub fn new(store: Arc<dyn OrderStore>, locks: Arc<EntityLocks>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locks,
            clock,
        }
    }

    /// Move a table to `to`; a request for the current status is a logged no-op
    pub async fn transition(
        &self,
        table_id: i64,
        to: TableStatus,
        meta: TransitionMeta,
    ) -> EngineResult<DiningTable> {
        let _locks = self.locks.lock(EntityKey::Table(table_id)).await;

        let table = self.store.get_table(table_id).await?;
        let plan = match plan_transition(&table, to, &meta, self.clock.now_millis()) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(table_id, from = %table.status, to = %to, "Table transition rejected");
                return Err(e);
            }
        };
        let changed = plan.changed;

        let mut changes = ChangeSet::new();
        let table_after = plan.stage(&mut changes);
        self.store.commit(changes).await?;

        if changed {
            tracing::info!(
                table_id,
                from = %table.status,
                to = %to,
                actor = ?meta.actor,
                "Table transitioned"
            );
        } else {
            tracing::debug!(table_id, status = %to, "Table transition no-op");
        }
        Ok(table_after)
    }

    /// Restaurant setup: add an `Available` table
    pub async fn register(&self, number: impl Into<String>, capacity: i32) -> EngineResult<DiningTable> {
        let id = self.store.next_table_id().await?;
        let table = DiningTable::new(id, number, capacity, self.clock.now_millis());
        let mut changes = ChangeSet::new();
        changes.insert_table(table.clone());
        self.store.commit(changes).await?;

        tracing::info!(table_id = id, number = %table.number, capacity, "Table registered");
        Ok(table)
    }

    // ========== Queries ==========

    pub async fn get_table(&self, table_id: i64) -> EngineResult<DiningTable> {
        Ok(self.store.get_table(table_id).await?)
    }

    pub async fn list_tables(&self) -> EngineResult<Vec<DiningTable>> {
        Ok(self.store.list_tables().await?)
    }

    pub async fn tables_with_status(&self, status: TableStatus) -> EngineResult<Vec<DiningTable>> {
        let mut tables = self.store.list_tables().await?;
        tables.retain(|t| t.status == status);
        Ok(tables)
    }

    pub async fn available_tables(&self) -> EngineResult<Vec<DiningTable>> {
        self.tables_with_status(TableStatus::Available).await
    }

    /// 已结账待清台
    pub async fn tables_needing_cleaning(&self) -> EngineResult<Vec<DiningTable>> {
        self.tables_with_status(TableStatus::PaymentCompleted).await
    }
}
