//! Immutable stock movement log

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    In,
    Out,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "IN",
            TransactionType::Out => "OUT",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(TransactionType::In),
            "OUT" => Some(TransactionType::Out),
            "ADJUSTMENT" => Some(TransactionType::Adjustment),
            _ => None,
        }
    }
}

/// One stock-affecting movement, written exactly once at approval time.
///
/// Rows are append-only; nothing updates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub item_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub processed_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
