//! # Money Module
//!
//! Integer money for prices, invoice totals and purchase costs.
//!
//! ## Where Money Shows Up
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CSV "precio_venta" ──► Money::parse ──► Product.sale_price_cents       │
//! │                                                 │                       │
//! │  SaleLine.unit_price × quantity ──► InvoiceLine.line_total              │
//! │                                                 │                       │
//! │  Σ line_total ──► subtotal ──► calculate_tax(VAT) ──► vat ──► total     │
//! │                                                                         │
//! │  Stored as i64 cents in both the local and the remote store.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use botica_core::money::Money;
//!
//! let price = Money::parse("12,50", "precio_venta").unwrap();
//! assert_eq!(price.cents(), 1250);
//! assert_eq!((price * 2).cents(), 2500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed, so that adjustments and corrections can be represented, but every
/// stored price and total is validated to be non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole units (the part before the decimal separator).
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Fractional cents, always 0-99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Parses a human-entered decimal amount.
    ///
    /// Accepts either `.` or `,` as the decimal separator and at most two
    /// fractional digits: `"12,50"`, `"12.5"` and `"1250"` are all valid.
    /// Thousands separators are not supported.
    ///
    /// ## Arguments
    /// * `input` - The raw text (surrounding whitespace is ignored)
    /// * `field` - Field name used in the validation error
    ///
    /// ## Example
    /// ```rust
    /// use botica_core::money::Money;
    ///
    /// assert_eq!(Money::parse("3,5", "price").unwrap().cents(), 350);
    /// assert!(Money::parse("3,555", "price").is_err());
    /// assert!(Money::parse("abc", "price").is_err());
    /// ```
    pub fn parse(input: &str, field: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        let text = input.trim();
        if text.is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let normalized = digits.replace(',', ".");
        let mut parts = normalized.splitn(2, '.');
        let whole = parts.next().unwrap_or_default();
        let fraction = parts.next().unwrap_or_default();

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("not a decimal number"));
        }
        if fraction.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };
        let fraction_value: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("not a decimal number"))? * 10,
            _ => fraction.parse().map_err(|_| invalid("not a decimal number"))?,
        };

        let cents = whole_value
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_value))
            .ok_or_else(|| invalid("amount too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Calculates VAT on this amount.
    ///
    /// Integer math with half-up rounding: `(amount * bps + 5000) / 10000`.
    /// i128 keeps large invoice totals from overflowing.
    ///
    /// ## Example
    /// ```rust
    /// use botica_core::money::Money;
    /// use botica_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(20000);
    /// assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(1900)).cents(), 3800);
    /// assert_eq!(subtotal.calculate_tax(TaxRate::zero()).cents(), 0);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies a unit price by a quantity. `None` on overflow.
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering; the GUI owns localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.units().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_parse_accepts_decimal_comma_and_point() {
        assert_eq!(Money::parse("12,50", "p").unwrap().cents(), 1250);
        assert_eq!(Money::parse("12.50", "p").unwrap().cents(), 1250);
        assert_eq!(Money::parse("12,5", "p").unwrap().cents(), 1250);
        assert_eq!(Money::parse(" 7 ", "p").unwrap().cents(), 700);
        assert_eq!(Money::parse(",99", "p").unwrap().cents(), 99);
        assert_eq!(Money::parse("-1,25", "p").unwrap().cents(), -125);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Money::parse("", "precio_venta"),
            Err(ValidationError::Required { .. })
        ));
        assert!(Money::parse("abc", "p").is_err());
        assert!(Money::parse("1,2,3", "p").is_err());
        assert!(Money::parse("1.234", "p").is_err());
        assert!(Money::parse(",", "p").is_err());
        assert!(Money::parse("99999999999999999999", "p").is_err());
    }

    #[test]
    fn test_vat() {
        let subtotal = Money::from_cents(1000);
        assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(1900)).cents(), 190);
        // 0.825 rounds half-up
        assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(825)).cents(), 83);
        assert!(subtotal.calculate_tax(TaxRate::zero()).is_zero());
    }

    #[test]
    fn test_sum_and_arithmetic() {
        let lines = vec![Money::from_cents(200), Money::from_cents(350)];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total.cents(), 550);
        assert_eq!((total - Money::from_cents(50)).cents(), 500);
        assert_eq!(Money::from_cents(299).checked_mul_quantity(3), Some(Money::from_cents(897)));
    }

    #[test]
    fn test_checked_arithmetic_overflow() {
        assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul_quantity(3), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(1).checked_add(Money::from_cents(2)),
            Some(Money::from_cents(3))
        );
    }
}
