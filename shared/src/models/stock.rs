//! Per-item stock aggregate

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized per-item stock level, derived from the batch store.
///
/// `current_stock` always equals the summed remaining quantity of the item's
/// active batches; the row is a read model, never the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: Uuid,
    pub current_stock: Decimal,
    pub reserved_stock: Decimal,
    pub available_stock: Decimal,
    pub average_cost: Decimal,
    pub total_value: Decimal,
    pub next_expiry_date: Option<NaiveDate>,
    pub last_updated: DateTime<Utc>,
}

impl StockLevel {
    /// An empty aggregate for an item with no batches yet
    pub fn empty(item_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            item_id,
            current_stock: Decimal::ZERO,
            reserved_stock: Decimal::ZERO,
            available_stock: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            total_value: Decimal::ZERO,
            next_expiry_date: None,
            last_updated: now,
        }
    }
}
