//! 桌台会话
//!
//! A QR seating opens a session for the table; later scans join it while it is
//! unexpired. Sessions live in process memory, one per table, and close when
//! the table is cleared.

use crate::error::{EngineError, EngineResult};
use crate::utils::Clock;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Customer session on one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSession {
    /// 32 位十六进制随机串
    pub session_id: String,
    pub table_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

impl TableSession {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }
}

/// In-process session registry keyed by table id
pub struct SessionRegistry {
    sessions: DashMap<i64, TableSession>,
    clock: Arc<dyn Clock>,
    ttl_millis: i64,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("ttl_millis", &self.ttl_millis)
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>, ttl_millis: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
            ttl_millis,
        }
    }

    fn fresh(&self, table_id: i64, now: i64) -> TableSession {
        TableSession {
            session_id: Uuid::new_v4().simple().to_string(),
            table_id,
            created_at: now,
            expires_at: now.saturating_add(self.ttl_millis),
        }
    }

    /// Open a new session, replacing whatever the table had
    pub fn open(&self, table_id: i64) -> TableSession {
        let session = self.fresh(table_id, self.clock.now_millis());
        if let Some(previous) = self.sessions.insert(table_id, session.clone()) {
            tracing::debug!(table_id, session_id = %previous.session_id, "Table session replaced");
        }
        tracing::info!(table_id, session_id = %session.session_id, "Table session opened");
        session
    }

    /// Running session of the table, or a new one when missing or expired
    ///
    /// The flag is true when an existing session was returned.
    pub fn current_or_open(&self, table_id: i64) -> (TableSession, bool) {
        let now = self.clock.now_millis();
        match self.sessions.entry(table_id) {
            Entry::Occupied(entry) if !entry.get().is_expired(now) => (entry.get().clone(), true),
            Entry::Occupied(mut entry) => {
                let session = self.fresh(table_id, now);
                tracing::info!(table_id, session_id = %session.session_id, "Expired table session renewed");
                entry.insert(session.clone());
                (session, false)
            }
            Entry::Vacant(entry) => {
                let session = self.fresh(table_id, now);
                tracing::info!(table_id, session_id = %session.session_id, "Table session opened");
                entry.insert(session.clone());
                (session, false)
            }
        }
    }

    /// Look up a session id; expired sessions are dropped
    pub fn validate(&self, session_id: &str) -> EngineResult<TableSession> {
        let now = self.clock.now_millis();
        // 桌台数量有限，直接遍历
        let found = self
            .sessions
            .iter()
            .find(|entry| entry.session_id == session_id)
            .map(|entry| entry.value().clone());
        let session = found.ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        if session.is_expired(now) {
            self.sessions
                .remove_if(&session.table_id, |_, s| s.session_id == session.session_id);
            tracing::debug!(session_id, table_id = session.table_id, "Table session expired");
            return Err(EngineError::SessionExpired {
                session_id: session.session_id,
                expired_at: session.expires_at,
            });
        }
        Ok(session)
    }

    /// Close the table's session, if any
    pub fn close(&self, table_id: i64) -> Option<TableSession> {
        let closed = self.sessions.remove(&table_id).map(|(_, session)| session);
        if let Some(session) = &closed {
            tracing::info!(table_id, session_id = %session.session_id, "Table session closed");
        }
        closed
    }

    pub fn get(&self, table_id: i64) -> Option<TableSession> {
        self.sessions.get(&table_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
