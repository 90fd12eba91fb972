//! Inventory batches (received lots) and FIFO consumption planning

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of an inventory batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Depleted,
    Expired,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Depleted => "depleted",
            BatchStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BatchStatus::Active),
            "depleted" => Some(BatchStatus::Depleted),
            "expired" => Some(BatchStatus::Expired),
            _ => None,
        }
    }
}

/// A received lot of one item with its own cost and expiry.
///
/// Created only by an approved Import or good-condition Return; decremented
/// only by FIFO consumption. Never deleted: a batch that reaches exactly
/// zero becomes `depleted` and is kept for costing history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryBatch {
    pub id: Uuid,
    pub item_id: Uuid,
    pub batch_number: Option<String>,
    pub initial_quantity: Decimal,
    pub current_quantity: Decimal,
    pub unit_cost: Decimal,
    pub received_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub supplier_id: Option<Uuid>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

/// Minimal batch view used for FIFO planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSnapshot {
    pub id: Uuid,
    pub current_quantity: Decimal,
    pub unit_cost: Decimal,
}

/// One (batch, quantity, cost) draw produced by FIFO consumption
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchDraw {
    pub batch_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Requested quantity exceeds what the active batches hold
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("requested {requested} exceeds available {available}")]
pub struct FifoShortfall {
    pub requested: Decimal,
    pub available: Decimal,
}

/// Plan a FIFO consumption of `requested` units over `batches`.
///
/// Batches must be given oldest-received first; each is drawn down to zero
/// before the next is touched. Returns the exact draws, or a shortfall when
/// the batches together hold less than `requested`. Planning never mutates
/// anything: callers apply the draws inside their own transaction.
pub fn plan_fifo(batches: &[BatchSnapshot], requested: Decimal) -> Result<Vec<BatchDraw>, FifoShortfall> {
    let available: Decimal = batches.iter().map(|b| b.current_quantity).sum();
    if available < requested {
        return Err(FifoShortfall {
            requested,
            available,
        });
    }

    let mut draws = Vec::new();
    let mut remaining = requested;
    for batch in batches {
        if remaining <= Decimal::ZERO {
            break;
        }
        if batch.current_quantity <= Decimal::ZERO {
            continue;
        }
        let take = remaining.min(batch.current_quantity);
        draws.push(BatchDraw {
            batch_id: batch.id,
            quantity: take,
            unit_cost: batch.unit_cost,
        });
        remaining -= take;
    }

    Ok(draws)
}

/// Weighted average unit cost over the remaining quantity of `batches`.
///
/// Returns zero when nothing remains, matching an empty stock aggregate.
pub fn weighted_average_cost(batches: &[BatchSnapshot]) -> Decimal {
    let total_quantity: Decimal = batches.iter().map(|b| b.current_quantity).sum();
    if total_quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let total_value: Decimal = batches
        .iter()
        .map(|b| b.current_quantity * b.unit_cost)
        .sum();
    total_value / total_quantity
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn snapshot(qty: &str, cost: &str) -> BatchSnapshot {
        BatchSnapshot {
            id: Uuid::new_v4(),
            current_quantity: dec(qty),
            unit_cost: dec(cost),
        }
    }

    #[test]
    fn drains_oldest_batch_before_touching_newer() {
        let b1 = snapshot("5", "10000");
        let b2 = snapshot("10", "12000");
        let draws = plan_fifo(&[b1.clone(), b2.clone()], dec("7")).unwrap();

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].batch_id, b1.id);
        assert_eq!(draws[0].quantity, dec("5"));
        assert_eq!(draws[1].batch_id, b2.id);
        assert_eq!(draws[1].quantity, dec("2"));
    }

    #[test]
    fn exact_depletion_consumes_single_batch() {
        let b1 = snapshot("5", "10000");
        let draws = plan_fifo(&[b1.clone()], dec("5")).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].quantity, dec("5"));
    }

    #[test]
    fn shortfall_reports_available_total() {
        let err = plan_fifo(&[snapshot("3", "1"), snapshot("4", "1")], dec("10")).unwrap_err();
        assert_eq!(err.available, dec("7"));
        assert_eq!(err.requested, dec("10"));
    }

    #[test]
    fn average_cost_weights_by_remaining_quantity() {
        let avg = weighted_average_cost(&[snapshot("5", "10000"), snapshot("15", "14000")]);
        assert_eq!(avg, dec("13000"));
    }

    #[test]
    fn average_cost_of_empty_stock_is_zero() {
        assert_eq!(weighted_average_cost(&[]), Decimal::ZERO);
        assert_eq!(weighted_average_cost(&[snapshot("0", "9000")]), Decimal::ZERO);
    }
}
