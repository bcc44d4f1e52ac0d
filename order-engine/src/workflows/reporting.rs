//! 履历查询与报表

use crate::audit::report::{build_payment_report, build_table_status_report};
use crate::audit::{PaymentReport, TableStatusReport};
use crate::core::EngineState;
use crate::error::EngineResult;
use crate::storage::HistoryQuery;
use shared::models::{DateRange, EntityType, Order, TransitionRecord};
use std::collections::{BTreeSet, HashMap};

impl EngineState {
    /// Records of one entity within `range` (inclusive), oldest first
    pub async fn get_history(
        &self,
        entity_type: EntityType,
        entity_id: impl ToString,
        range: DateRange,
    ) -> EngineResult<Vec<TransitionRecord>> {
        let query = HistoryQuery::for_entity(entity_type, entity_id).in_range(range);
        Ok(self.store.history(&query).await?)
    }

    pub async fn table_status_report(&self, range: DateRange) -> EngineResult<TableStatusReport> {
        let query = HistoryQuery {
            entity_type: Some(EntityType::Table),
            entity_id: None,
            range,
        };
        let records = self.store.history(&query).await?;
        Ok(build_table_status_report(range, records))
    }

    pub async fn payment_report(&self, range: DateRange) -> EngineResult<PaymentReport> {
        let query = HistoryQuery {
            entity_type: Some(EntityType::Order),
            entity_id: None,
            range,
        };
        let records: Vec<TransitionRecord> = self
            .store
            .history(&query)
            .await?
            .into_iter()
            .filter(TransitionRecord::is_payment)
            .collect();

        let paid_ids: BTreeSet<i64> = records
            .iter()
            .filter(|r| r.to_state == "paid")
            .filter_map(|r| r.entity_id.parse().ok())
            .collect();
        let mut orders: HashMap<i64, Order> = HashMap::with_capacity(paid_ids.len());
        for id in paid_ids {
            orders.insert(id, self.store.get_order(id).await?);
        }

        Ok(build_payment_report(range, records, &orders))
    }
}
