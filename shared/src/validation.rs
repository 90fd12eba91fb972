//! Validation utilities for the Restaurant Inventory Platform
//!
//! Pure checks shared by the backend services: quantity/date rules and the
//! reconciliation arithmetic invariants.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::ReconciliationLine;

/// Tolerance for reconciliation arithmetic comparisons (1/1000 of a unit)
pub fn reconciliation_tolerance() -> Decimal {
    Decimal::new(1, 3)
}

/// Validate that a quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than 0");
    }
    Ok(())
}

/// Validate that a document date is not in the future
pub fn validate_document_date(date: NaiveDate, today: NaiveDate) -> Result<(), &'static str> {
    if date > today {
        return Err("Document date cannot be in the future");
    }
    Ok(())
}

/// Validate that an expiry date lies after the given reference date
pub fn validate_expiry_date(expiry: NaiveDate, today: NaiveDate) -> Result<(), &'static str> {
    if expiry <= today {
        return Err("Expiry date must be in the future");
    }
    Ok(())
}

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Check a reconciliation line's arithmetic.
///
/// The stated system stock must match the movement columns, the discrepancy
/// must equal actual − system, and the rate must equal
/// discrepancy / system × 100, each within [`reconciliation_tolerance`].
pub fn verify_reconciliation_line(line: &ReconciliationLine) -> Result<(), &'static str> {
    let tolerance = reconciliation_tolerance();

    if line.actual_stock < Decimal::ZERO {
        return Err("Actual stock cannot be negative");
    }
    if (line.expected_system_stock() - line.system_stock).abs() > tolerance {
        return Err("System stock does not match the recorded movements");
    }
    if (line.expected_discrepancy() - line.discrepancy).abs() > tolerance {
        return Err("Discrepancy does not match actual minus system stock");
    }
    if (line.expected_discrepancy_rate() - line.discrepancy_rate).abs() > tolerance {
        return Err("Discrepancy rate does not match the figures");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line() -> ReconciliationLine {
        // opening 100 + received 20 − withdrawn 5 − sold 80 − wasted 2
        // − staff 1 − sampled 0 + returned 0 = 32
        ReconciliationLine {
            item_id: Uuid::new_v4(),
            opening_stock: dec("100"),
            received: dec("20"),
            withdrawn: dec("5"),
            sold: dec("80"),
            returned: dec("0"),
            wasted: dec("2"),
            staff_consumed: dec("1"),
            sampled: dec("0"),
            system_stock: dec("32"),
            actual_stock: dec("30"),
            discrepancy: dec("-2"),
            discrepancy_rate: dec("-6.25"),
            discrepancy_value: dec("-20000"),
            notes: None,
        }
    }

    #[test]
    fn accepts_consistent_line() {
        assert!(verify_reconciliation_line(&line()).is_ok());
    }

    #[test]
    fn rejects_mismatched_system_stock() {
        let mut bad = line();
        bad.system_stock = dec("33");
        // discrepancy figures recomputed against the (wrong) system stock
        bad.discrepancy = dec("-3");
        bad.discrepancy_rate = bad.discrepancy / bad.system_stock * dec("100");
        assert_eq!(
            verify_reconciliation_line(&bad),
            Err("System stock does not match the recorded movements")
        );
    }

    #[test]
    fn rejects_mismatched_discrepancy() {
        let mut bad = line();
        bad.discrepancy = dec("2");
        assert!(verify_reconciliation_line(&bad).is_err());
    }

    #[test]
    fn rejects_negative_actual_stock() {
        let mut bad = line();
        bad.actual_stock = dec("-1");
        assert_eq!(
            verify_reconciliation_line(&bad),
            Err("Actual stock cannot be negative")
        );
    }

    #[test]
    fn zero_system_stock_uses_zero_rate() {
        let mut l = line();
        l.opening_stock = dec("0");
        l.received = dec("0");
        l.withdrawn = dec("0");
        l.sold = dec("0");
        l.wasted = dec("0");
        l.staff_consumed = dec("0");
        l.system_stock = dec("0");
        l.actual_stock = dec("3");
        l.discrepancy = dec("3");
        l.discrepancy_rate = dec("0");
        assert!(verify_reconciliation_line(&l).is_ok());
    }
}
