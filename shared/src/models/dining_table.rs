//! Dining Table Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Table occupancy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// 空闲，可入座
    Available,
    /// 用餐中
    Occupied,
    /// 已请求结账
    PaymentRequested,
    /// 结账完成，等待清台
    PaymentCompleted,
    /// 清台中
    Cleaning,
    /// 已预订
    Reserved,
    /// 维护中
    Maintenance,
}

impl TableStatus {
    pub const ALL: [TableStatus; 7] = [
        TableStatus::Available,
        TableStatus::Occupied,
        TableStatus::PaymentRequested,
        TableStatus::PaymentCompleted,
        TableStatus::Cleaning,
        TableStatus::Reserved,
        TableStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::PaymentRequested => "payment_requested",
            Self::PaymentCompleted => "payment_completed",
            Self::Cleaning => "cleaning",
            Self::Reserved => "reserved",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown table status: {}", s))
    }
}

/// Dining table entity (桌台)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: i64,
    /// Display number, e.g. "A1"
    pub number: String,
    pub capacity: i32,
    pub status: TableStatus,
    /// Unix millis of the last status change
    pub last_transition_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_note: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl DiningTable {
    /// A freshly set-up table, `Available`
    pub fn new(id: i64, number: impl Into<String>, capacity: i32, now: i64) -> Self {
        Self {
            id,
            number: number.into(),
            capacity,
            status: TableStatus::Available,
            last_transition_at: now,
            last_updated_by: None,
            status_note: None,
            version: 0,
        }
    }
}
