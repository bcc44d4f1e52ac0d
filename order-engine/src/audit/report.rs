//! 报表
//!
//! Pure builders over transition records. No-op records never count.

use serde::{Deserialize, Serialize};
use shared::models::{DateRange, Order, TableStatus, TransitionRecord};
use std::collections::{BTreeMap, HashMap};

const MILLIS_PER_MINUTE: i64 = 60_000;

fn round_minutes(millis: i64) -> i64 {
    (millis + MILLIS_PER_MINUTE / 2) / MILLIS_PER_MINUTE
}

/// Table usage over a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStatusReport {
    pub range: Option<DateRange>,
    /// Real transitions in range
    pub total_transitions: usize,
    /// table id → Available → Occupied count
    pub seatings: BTreeMap<String, u32>,
    /// table id → total occupied minutes
    pub occupied_minutes: BTreeMap<String, i64>,
    /// table id → average minutes per occupied interval
    pub average_occupied_minutes: BTreeMap<String, i64>,
    /// target status → count
    pub status_counts: BTreeMap<String, u32>,
    pub records: Vec<TransitionRecord>,
}

/// `records`: table records in append order
pub fn build_table_status_report(range: DateRange, records: Vec<TransitionRecord>) -> TableStatusReport {
    let occupied = TableStatus::Occupied.as_str();
    let available = TableStatus::Available.as_str();

    let records: Vec<TransitionRecord> = records.into_iter().filter(|r| !r.is_no_op()).collect();
    let mut report = TableStatusReport {
        range: Some(range),
        total_transitions: records.len(),
        ..Default::default()
    };

    // table id → (interval start, total millis, interval count)
    let mut intervals: HashMap<&str, (Option<i64>, i64, i64)> = HashMap::new();
    for record in &records {
        *report.status_counts.entry(record.to_state.clone()).or_default() += 1;
        if record.from_state == available && record.to_state == occupied {
            *report.seatings.entry(record.entity_id.clone()).or_default() += 1;
        }

        let entry = intervals.entry(record.entity_id.as_str()).or_default();
        if record.to_state == occupied {
            entry.0 = Some(record.timestamp);
        } else if record.from_state == occupied
            && let Some(start) = entry.0.take()
        {
            entry.1 += record.timestamp - start;
            entry.2 += 1;
        }
    }

    for (table_id, (_, total, count)) in intervals {
        if count == 0 {
            continue;
        }
        report
            .occupied_minutes
            .insert(table_id.to_string(), round_minutes(total));
        report
            .average_occupied_minutes
            .insert(table_id.to_string(), round_minutes(total / count));
    }
    report.records = records;
    report
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSummary {
    pub count: u32,
    pub amount: i64,
}

/// Payments over a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentReport {
    pub range: Option<DateRange>,
    pub total_transitions: usize,
    /// payment method → paid orders and amount
    pub methods: BTreeMap<String, MethodSummary>,
    pub total_paid: i64,
    /// target payment status → count
    pub status_counts: BTreeMap<String, u32>,
    pub records: Vec<TransitionRecord>,
}

/// `records`: order payment-status records; `orders`: the paid orders by id
pub fn build_payment_report(
    range: DateRange,
    records: Vec<TransitionRecord>,
    orders: &HashMap<i64, Order>,
) -> PaymentReport {
    let records: Vec<TransitionRecord> = records
        .into_iter()
        .filter(|r| r.is_payment() && !r.is_no_op())
        .collect();
    let mut report = PaymentReport {
        range: Some(range),
        total_transitions: records.len(),
        ..Default::default()
    };

    for record in &records {
        *report.status_counts.entry(record.to_state.clone()).or_default() += 1;
        if record.to_state != "paid" {
            continue;
        }
        let Some(order) = record
            .entity_id
            .parse::<i64>()
            .ok()
            .and_then(|id| orders.get(&id))
        else {
            tracing::warn!(order_id = %record.entity_id, "Paid record without order");
            continue;
        };
        let method = order
            .payment_method
            .map_or("unknown", |m| m.as_str())
            .to_string();
        let summary = report.methods.entry(method).or_default();
        summary.count += 1;
        summary.amount += order.grand_total;
        report.total_paid += order.grand_total;
    }
    report.records = records;
    report
}
