use crate::audit::TransitionMeta;
use crate::error::{EngineError, EngineResult, TransitionScope};
use crate::storage::ChangeSet;
use shared::models::{EntityType, Order, PaymentStatus, TransitionRecord};

pub fn allowed_targets(from: PaymentStatus) -> &'static [PaymentStatus] {
    use PaymentStatus::*;
    match from {
        Unpaid => &[Requested],
        Requested => &[Pending, Unpaid],
        Pending => &[Paid, Failed],
        Failed => &[Pending, Unpaid],
        Paid | Refunded | Cancelled => &[],
    }
}

pub fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Move an order's payment status along one edge and stage its record
pub(crate) fn step(
    order: &mut Order,
    to: PaymentStatus,
    meta: &TransitionMeta,
    note: Option<String>,
    now: i64,
    changes: &mut ChangeSet,
) -> EngineResult<()> {
    let from = order.payment_status;
    if !can_transition(from, to) {
        return Err(EngineError::illegal(TransitionScope::PaymentStatus, from, to));
    }
    let record = TransitionRecord::new(EntityType::Order, order.id, from, to, now)
        .for_payment()
        .with_note(note);
    changes.record(meta.stamp(record));
    order.payment_status = to;
    order.updated_at = now;
    Ok(())
}
