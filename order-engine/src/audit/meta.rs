use shared::models::TransitionRecord;

/// Who asked for a transition and why
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionMeta {
    pub actor: Option<String>,
    pub note: Option<String>,
}

impl TransitionMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// 操作人 (员工 id / "customer")
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Copy actor and note onto a record; an explicit record note wins
    pub fn stamp(&self, record: TransitionRecord) -> TransitionRecord {
        let note = record.note.clone().or_else(|| self.note.clone());
        record.with_actor(self.actor.clone()).with_note(note)
    }
}
