//! 扫码入座

use super::FlowOutcome;
use crate::audit::TransitionMeta;
use crate::core::EngineState;
use crate::error::{EngineError, EngineResult, TransitionScope};
use crate::sessions::TableSession;
use crate::tokens::TableClaims;
use serde::{Deserialize, Serialize};
use shared::models::{DiningTable, Order, LineItemInput, TableStatus};

/// Result of a customer scanning a table QR code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatingOutcome {
    pub table: DiningTable,
    pub claims: TableClaims,
    /// Session the scanning customer joins
    pub session: TableSession,
    /// true when the table was already seated and its session still valid
    pub reused_session: bool,
}

impl EngineState {
    /// Signed QR link printed on the table
    pub fn table_qr_url(&self, table_id: i64) -> EngineResult<String> {
        let token = self.tokens.issue_table_token(table_id)?;
        let base = &self.config.customer_base_url;
        let separator = if base.contains('?') { '&' } else { '?' };
        Ok(format!("{base}{separator}table={table_id}&token={token}"))
    }

    /// Customer scans the table QR code
    ///
    /// `Available`/`Reserved` tables become `Occupied` and open a new session;
    /// an `Occupied` or `PaymentRequested` table keeps its running session,
    /// renewed first if it has expired.
    pub async fn seat_by_qr(&self, token: &str, meta: TransitionMeta) -> EngineResult<SeatingOutcome> {
        let claims = self.tokens.verify_table_token(token).inspect_err(|e| {
            tracing::warn!(error = %e, "Table token rejected");
        })?;
        let table = self.tables.get_table(claims.table_id).await?;

        match table.status {
            TableStatus::Occupied | TableStatus::PaymentRequested => {
                let (session, reused_session) = self.sessions.current_or_open(table.id);
                tracing::debug!(table_id = table.id, reused_session, "Joining running table");
                Ok(SeatingOutcome {
                    table,
                    claims,
                    session,
                    reused_session,
                })
            }
            TableStatus::Available | TableStatus::Reserved => {
                let table = self
                    .tables
                    .transition(table.id, TableStatus::Occupied, meta)
                    .await?;
                let session = self.sessions.open(table.id);
                Ok(SeatingOutcome {
                    table,
                    claims,
                    session,
                    reused_session: false,
                })
            }
            other => Err(EngineError::illegal(
                TransitionScope::Table,
                other,
                TableStatus::Occupied,
            )),
        }
    }

    /// Scan, then place an order on the scanned table
    pub async fn order_by_qr(
        &self,
        token: &str,
        items: Vec<LineItemInput>,
        meta: TransitionMeta,
    ) -> EngineResult<FlowOutcome<Order>> {
        let seating = self.seat_by_qr(token, meta.clone()).await?;
        let order = self
            .orders
            .create_order(seating.table.id, items, meta)
            .await?;
        let table = self.tables.get_table(order.table_id).await.ok();
        Ok(FlowOutcome { value: order, table })
    }

    /// Check a session id presented by a returning customer
    pub fn validate_table_session(&self, session_id: &str) -> EngineResult<TableSession> {
        self.sessions.validate(session_id).inspect_err(|e| {
            tracing::warn!(session_id, error = %e, "Table session rejected");
        })
    }

    /// Place an order through an already-open session, without rescanning
    pub async fn order_by_session(
        &self,
        session_id: &str,
        items: Vec<LineItemInput>,
        meta: TransitionMeta,
    ) -> EngineResult<FlowOutcome<Order>> {
        let session = self.validate_table_session(session_id)?;
        let order = self
            .orders
            .create_order(session.table_id, items, meta)
            .await?;
        let table = self.tables.get_table(order.table_id).await.ok();
        Ok(FlowOutcome { value: order, table })
    }
}
