//! # Invoice Arithmetic
//!
//! Numbering and totals for invoices and purchases. Pure functions; the sale
//! engine calls them inside its transaction.
//!
//! ## Numbering
//! ```text
//! last number    parse_suffix    max(_, 999) + 1    next
//! ───────────    ────────────    ───────────────    ─────────
//! (none)         -               -                  FAC-1001  (start)
//! FAC-1001       1001            1002               FAC-1002
//! FAC-42         42              1000               FAC-1000
//! garbage        -               1000               FAC-1000
//! ```
//!
//! The first invoice of an empty store is always `FAC-1001`; see
//! [`next_invoice_number`].

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::TaxRate;
use crate::{FIRST_INVOICE_NUMBER, INVOICE_PREFIX};

/// Extracts `n` from `FAC-<n>`.
///
/// ## Example
/// ```rust
/// use botica_core::invoice::parse_suffix;
///
/// assert_eq!(parse_suffix("FAC-1005"), Some(1005));
/// assert_eq!(parse_suffix("FAC-"), None);
/// assert_eq!(parse_suffix("INV-12"), None);
/// ```
pub fn parse_suffix(number: &str) -> Option<i64> {
    let digits = number.trim().strip_prefix(INVOICE_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next invoice number given the highest number issued so far.
///
/// `max(parse_suffix(last), FIRST_INVOICE_NUMBER - 2) + 1` with the empty
/// store special-cased to `FIRST_INVOICE_NUMBER`.
///
/// ## Example
/// ```rust
/// use botica_core::invoice::next_invoice_number;
///
/// assert_eq!(next_invoice_number(None), "FAC-1001");
/// assert_eq!(next_invoice_number(Some("FAC-1001")), "FAC-1002");
/// assert_eq!(next_invoice_number(Some("FAC-7")), "FAC-1000");
/// ```
pub fn next_invoice_number(last: Option<&str>) -> String {
    let next = match last {
        None => FIRST_INVOICE_NUMBER,
        Some(number) => {
            let floor = FIRST_INVOICE_NUMBER - 2;
            parse_suffix(number).unwrap_or(floor).max(floor) + 1
        }
    };
    format_invoice_number(next)
}

pub fn format_invoice_number(n: i64) -> String {
    format!("{}{}", INVOICE_PREFIX, n)
}

// =============================================================================
// Totals
// =============================================================================

/// Subtotal, VAT and total of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub vat: Money,
    pub total: Money,
}

/// Accumulates line totals while a sale walks its lines.
#[derive(Debug, Clone, Default)]
pub struct TotalsAccumulator {
    subtotal: Money,
}

impl TotalsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a line and returns its `quantity × unit_price`.
    ///
    /// ## Errors
    /// * `ValidationError::OutOfRange` - The line or the running subtotal
    ///   does not fit in an `i64` of cents
    pub fn add_line(&mut self, quantity: i64, unit_price: Money) -> Result<Money, ValidationError> {
        let line_total = unit_price.checked_mul_quantity(quantity).ok_or_else(|| out_of_range("quantity"))?;
        self.subtotal = self.subtotal.checked_add(line_total).ok_or_else(|| out_of_range("subtotal"))?;
        Ok(line_total)
    }

    pub fn finish(&self, vat_rate: TaxRate) -> Result<InvoiceTotals, ValidationError> {
        let vat = self.subtotal.calculate_tax(vat_rate);
        let total = self.subtotal.checked_add(vat).ok_or_else(|| out_of_range("total"))?;
        Ok(InvoiceTotals {
            subtotal: self.subtotal,
            vat,
            total,
        })
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_following_numbers() {
        assert_eq!(next_invoice_number(None), "FAC-1001");
        assert_eq!(next_invoice_number(Some("FAC-1001")), "FAC-1002");
        assert_eq!(next_invoice_number(Some("FAC-99999")), "FAC-100000");
    }

    #[test]
    fn test_malformed_last_number_falls_back_to_floor() {
        assert_eq!(next_invoice_number(Some("not-a-number")), "FAC-1000");
        assert_eq!(next_invoice_number(Some("FAC-12a")), "FAC-1000");
        assert_eq!(parse_suffix(" FAC-12 "), Some(12));
    }

    #[test]
    fn test_totals() {
        let mut acc = TotalsAccumulator::new();
        assert_eq!(acc.add_line(2, Money::from_cents(100)).unwrap().cents(), 200);
        assert_eq!(acc.add_line(3, Money::from_cents(50)).unwrap().cents(), 150);

        let untaxed = acc.finish(TaxRate::zero()).unwrap();
        assert_eq!(untaxed.subtotal.cents(), 350);
        assert_eq!(untaxed.total, untaxed.subtotal);

        let taxed = acc.finish(TaxRate::from_bps(1900)).unwrap();
        assert_eq!(taxed.vat.cents(), 67);
        assert_eq!(taxed.total.cents(), 417);
    }

    #[test]
    fn test_overflowing_line_is_rejected() {
        let mut acc = TotalsAccumulator::new();
        let err = acc.add_line(i64::MAX, Money::from_cents(2)).unwrap_err();
        assert_eq!(err.field(), "quantity");

        acc.add_line(1, Money::from_cents(i64::MAX)).unwrap();
        let err = acc.add_line(1, Money::from_cents(1)).unwrap_err();
        assert_eq!(err.field(), "subtotal");
    }
}
