//! Money calculation using rust_decimal for precision
//!
//! Amounts are integer minor units (cents). Tax is the only fractional step:
//! `subtotal × rate` is computed as a `Decimal` and rounded half-up back to
//! whole units.

use crate::error::{EngineError, EngineResult};
use rust_decimal::prelude::*;
use shared::models::{LineItem, LineItemInput};

/// Maximum allowed unit price (1,000,000.00 in minor units)
const MAX_UNIT_PRICE: i64 = 100_000_000;
/// Maximum allowed quantity per item
const MAX_QUANTITY: i32 = 9999;

/// Order totals in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub tax_amount: i64,
    pub grand_total: i64,
}

/// Validate a line item before it is snapshotted
pub fn validate_line_item(item: &LineItemInput) -> EngineResult<()> {
    if !(1..=MAX_QUANTITY).contains(&item.quantity) {
        return Err(EngineError::InvalidLineItem(format!(
            "quantity of '{}' must be between 1 and {}, got {}",
            item.name, MAX_QUANTITY, item.quantity
        )));
    }
    if !(0..=MAX_UNIT_PRICE).contains(&item.unit_price) {
        return Err(EngineError::InvalidLineItem(format!(
            "unit price of '{}' must be between 0 and {}, got {}",
            item.name, MAX_UNIT_PRICE, item.unit_price
        )));
    }
    Ok(())
}

/// Snapshot a validated input; the price is frozen from here on
pub fn snapshot_line_item(item: &LineItemInput) -> EngineResult<LineItem> {
    validate_line_item(item)?;
    let line_total = item
        .unit_price
        .checked_mul(i64::from(item.quantity))
        .ok_or_else(|| EngineError::InvalidLineItem(format!("line total overflow: '{}'", item.name)))?;
    Ok(LineItem {
        menu_item_id: item.menu_item_id,
        name: item.name.clone(),
        quantity: item.quantity,
        unit_price_at_order_time: item.unit_price,
        line_total,
        status: Default::default(),
        note: item.note.clone(),
    })
}

/// `round(subtotal × rate)`, half-up
pub fn compute_tax(subtotal: i64, tax_rate: Decimal) -> EngineResult<i64> {
    let tax = Decimal::from(subtotal)
        .checked_mul(tax_rate)
        .ok_or_else(|| EngineError::InvalidLineItem("tax overflow".into()))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    tax.to_i64()
        .ok_or_else(|| EngineError::InvalidLineItem("tax overflow".into()))
}

pub fn compute_totals(items: &[LineItem], tax_rate: Decimal) -> EngineResult<OrderTotals> {
    let subtotal = items
        .iter()
        .try_fold(0i64, |acc, item| acc.checked_add(item.line_total))
        .ok_or_else(|| EngineError::InvalidLineItem("subtotal overflow".into()))?;
    let tax_amount = compute_tax(subtotal, tax_rate)?;
    let grand_total = subtotal
        .checked_add(tax_amount)
        .ok_or_else(|| EngineError::InvalidLineItem("total overflow".into()))?;
    Ok(OrderTotals {
        subtotal,
        tax_amount,
        grand_total,
    })
}
