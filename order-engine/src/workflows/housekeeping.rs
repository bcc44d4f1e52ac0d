//! 清台

use crate::audit::TransitionMeta;
use crate::core::EngineState;
use crate::error::EngineResult;
use shared::models::{DiningTable, TableStatus};

impl EngineState {
    /// 顾客离开，会话随之关闭
    pub async fn start_cleaning(&self, table_id: i64, staff_id: &str) -> EngineResult<DiningTable> {
        let table = self
            .tables
            .transition(table_id, TableStatus::Cleaning, TransitionMeta::by(staff_id))
            .await?;
        self.sessions.close(table_id);
        Ok(table)
    }

    pub async fn finish_cleaning(&self, table_id: i64, staff_id: &str) -> EngineResult<DiningTable> {
        let table = self
            .tables
            .transition(table_id, TableStatus::Available, TransitionMeta::by(staff_id))
            .await?;
        self.sessions.close(table_id);
        Ok(table)
    }
}
