//! # Domain Types
//!
//! Value types shared by every layer: tax rate, the closed enums stored as
//! TEXT, and the pagination envelope.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌─────────────────┐   ┌────────────────────┐   ┌─────────────────┐    │
//! │  │    TaxRate      │   │ StockOperationKind │   │  PaymentMethod  │    │
//! │  │  ─────────────  │   │  ────────────────  │   │  ─────────────  │    │
//! │  │  bps (u32)      │   │  INITIAL  (+)      │   │  Cash           │    │
//! │  │  1900 = 19%     │   │  ADJUST   (±)      │   │  Card           │    │
//! │  └─────────────────┘   │  SALE     (−)      │   │  Transfer       │    │
//! │                        │  PURCHASE (+)      │   └─────────────────┘    │
//! │  ┌─────────────────┐   └────────────────────┘   ┌─────────────────┐    │
//! │  │  PageRequest    │                             │ InvoiceStatus   │    │
//! │  │  page, size,    │ ──► Page<T> { records,      │  Paid / Pending │    │
//! │  │  search, sort   │             total_records } │  / Voided       │    │
//! │  └─────────────────┘                             └─────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1 bp = 0.01%).
///
/// The VAT applied to invoices is a single configurable rate with default
/// zero; `VAT_RATE=0.19` becomes `TaxRate(1900)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a rate from a fraction (`0.19` = 19%).
    ///
    /// ## Returns
    /// `None` when the fraction is not finite or outside `[0, 1]`.
    pub fn from_fraction(fraction: f64) -> Option<Self> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return None;
        }
        Some(TaxRate((fraction * 10000.0).round() as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// For display only.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Stock Operation Kind
// =============================================================================

/// Kind of a ledger entry. The sign of `quantity_delta` follows the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum StockOperationKind {
    /// First stock of a newly registered product. Positive.
    Initial,
    /// Manual correction towards a desired stock. Either sign.
    Adjust,
    /// Units leaving with an invoice. Negative.
    Sale,
    /// Units arriving from a supplier. Positive.
    Purchase,
}

impl StockOperationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockOperationKind::Initial => "INITIAL",
            StockOperationKind::Adjust => "ADJUST",
            StockOperationKind::Sale => "SALE",
            StockOperationKind::Purchase => "PURCHASE",
        }
    }

    /// Checks that a delta has the sign this kind requires.
    pub const fn accepts_delta(&self, delta: i64) -> bool {
        match self {
            StockOperationKind::Initial | StockOperationKind::Purchase => delta > 0,
            StockOperationKind::Sale => delta < 0,
            StockOperationKind::Adjust => delta != 0,
        }
    }
}

impl fmt::Display for StockOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockOperationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INITIAL" => Ok(StockOperationKind::Initial),
            "ADJUST" => Ok(StockOperationKind::Adjust),
            "SALE" => Ok(StockOperationKind::Sale),
            "PURCHASE" => Ok(StockOperationKind::Purchase),
            _ => Err(not_allowed("kind", &["INITIAL", "ADJUST", "SALE", "PURCHASE"])),
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Voided,
}

impl InvoiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Voided => "Voided",
        }
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Paid
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(InvoiceStatus::Paid),
            "pending" => Ok(InvoiceStatus::Pending),
            "voided" => Ok(InvoiceStatus::Voided),
            _ => Err(not_allowed("status", &["Paid", "Pending", "Voided"])),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Transfer => "Transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            _ => Err(not_allowed("payment_method", &["Cash", "Card", "Transfer"])),
        }
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Sort direction for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Lenient parse: anything other than `desc` (any case) is ascending.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub const fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

/// Query for a paginated listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PageRequest {
    /// 1-based page number. Values below 1 are treated as 1.
    pub page: i64,
    /// Rows per page, clamped to `1..=MAX_PAGE_SIZE`.
    pub page_size: i64,
    /// Case-insensitive substring over the entity's search columns.
    #[serde(default)]
    pub search: String,
    /// One of the entity's whitelisted sort keys; unknown keys fall back to
    /// the entity default.
    #[serde(default)]
    pub sort_by: String,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        PageRequest {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = sort_by.into();
        self.sort_order = order;
        self
    }

    /// Effective page size after clamping.
    pub fn limit(&self) -> i64 {
        if self.page_size <= 0 {
            crate::DEFAULT_PAGE_SIZE
        } else {
            self.page_size.min(crate::MAX_PAGE_SIZE)
        }
    }

    /// Row offset of the requested page.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }

    /// The search term as a case-insensitive `GLOB` pattern, or `None` when
    /// empty.
    ///
    /// SQLite's `lower()` and `LIKE` only fold ASCII, so the folding happens
    /// here: every cased character becomes a class of its case variants and
    /// `"Ángela"` turns into `*[áÁ][nN][gG][eE][lL][aA]*`. Glob
    /// metacharacters in the term match literally.
    pub fn glob_pattern(&self) -> Option<String> {
        let term = self.search.trim();
        if term.is_empty() {
            return None;
        }

        let mut pattern = String::with_capacity(term.len() * 4 + 2);
        pattern.push('*');
        for c in term.chars() {
            let mut variants = vec![c];
            for variant in [single_char(c.to_lowercase()), single_char(c.to_uppercase())]
                .into_iter()
                .flatten()
            {
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }

            if variants.len() > 1 || matches!(c, '*' | '?' | '[') {
                pattern.push('[');
                pattern.extend(variants);
                pattern.push(']');
            } else {
                pattern.push(c);
            }
        }
        pattern.push('*');
        Some(pattern)
    }
}

/// The only char of a case mapping; `None` when it expands (`ß` to `SS`).
fn single_char(mut chars: impl Iterator<Item = char>) -> Option<char> {
    let first = chars.next()?;
    match chars.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total_records: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            total_records: self.total_records,
        }
    }
}

fn not_allowed(field: &str, allowed: &[&str]) -> ValidationError {
    ValidationError::NotAllowed {
        field: field.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_fraction() {
        assert_eq!(TaxRate::from_fraction(0.19).map(|r| r.bps()), Some(1900));
        assert_eq!(TaxRate::from_fraction(0.0).map(|r| r.bps()), Some(0));
        assert!(TaxRate::from_fraction(1.5).is_none());
        assert!(TaxRate::from_fraction(-0.1).is_none());
        assert!(TaxRate::from_fraction(f64::NAN).is_none());
    }

    #[test]
    fn test_kind_sign_rules() {
        assert!(StockOperationKind::Sale.accepts_delta(-2));
        assert!(!StockOperationKind::Sale.accepts_delta(2));
        assert!(StockOperationKind::Purchase.accepts_delta(10));
        assert!(!StockOperationKind::Initial.accepts_delta(0));
        assert!(StockOperationKind::Adjust.accepts_delta(-3));
        assert!(!StockOperationKind::Adjust.accepts_delta(0));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("sale".parse::<StockOperationKind>().unwrap(), StockOperationKind::Sale);
        assert_eq!("CASH".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
        assert_eq!(SortOrder::parse_lenient("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient("sideways"), SortOrder::Asc);
    }

    #[test]
    fn test_page_request_bounds() {
        let req = PageRequest::new(0, 0);
        assert_eq!(req.limit(), crate::DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);

        let req = PageRequest::new(3, 1000);
        assert_eq!(req.limit(), crate::MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 2 * crate::MAX_PAGE_SIZE);

        let far = PageRequest::new(i64::MAX, 50);
        assert_eq!(far.offset(), i64::MAX);
    }

    #[test]
    fn test_glob_pattern_folds_unicode_case() {
        assert_eq!(PageRequest::new(1, 10).search("  ").glob_pattern(), None);
        assert_eq!(
            PageRequest::new(1, 10).search("Mo1").glob_pattern().as_deref(),
            Some("*[Mm][oO]1*")
        );
        assert_eq!(
            PageRequest::new(1, 10).search("ñ").glob_pattern().as_deref(),
            Some("*[ñÑ]*")
        );
        assert_eq!(
            PageRequest::new(1, 10).search("Á").glob_pattern().as_deref(),
            Some("*[Áá]*")
        );
    }

    #[test]
    fn test_glob_pattern_escapes_wildcards() {
        assert_eq!(
            PageRequest::new(1, 10).search("10%*").glob_pattern().as_deref(),
            Some("*10%[*]*")
        );
        assert_eq!(
            PageRequest::new(1, 10).search("a?[").glob_pattern().as_deref(),
            Some("*[aA][?][[]*")
        );
    }
}
