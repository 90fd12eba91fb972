//! Reconciliation lines: expected-vs-counted stock per shift

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One item's reconciliation figures for a shift.
///
/// `system_stock` is what the movements imply, `actual_stock` the physical
/// count; the discrepancy fields must match the arithmetic in
/// [`crate::validation`] before the line is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationLine {
    pub item_id: Uuid,
    pub opening_stock: Decimal,
    pub received: Decimal,
    pub withdrawn: Decimal,
    pub sold: Decimal,
    pub returned: Decimal,
    pub wasted: Decimal,
    pub staff_consumed: Decimal,
    pub sampled: Decimal,
    pub system_stock: Decimal,
    pub actual_stock: Decimal,
    pub discrepancy: Decimal,
    pub discrepancy_rate: Decimal,
    pub discrepancy_value: Decimal,
    pub notes: Option<String>,
}

impl ReconciliationLine {
    /// System stock implied by the movement columns:
    /// opening + received − withdrawn − sold − wasted − staffConsumed − sampled + returned
    pub fn expected_system_stock(&self) -> Decimal {
        self.opening_stock + self.received - self.withdrawn - self.sold - self.wasted
            - self.staff_consumed
            - self.sampled
            + self.returned
    }

    /// Discrepancy implied by the counted stock
    pub fn expected_discrepancy(&self) -> Decimal {
        self.actual_stock - self.system_stock
    }

    /// Discrepancy as a percentage of system stock (zero when system stock is zero)
    pub fn expected_discrepancy_rate(&self) -> Decimal {
        if self.system_stock == Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.discrepancy / self.system_stock * Decimal::from(100)
        }
    }
}
