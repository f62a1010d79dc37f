//! # Entities
//!
//! Persistent records of the pharmacy plus the read models the facade
//! returns.
//!
//! ## Entity Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Seller ─────┐            ┌───── Client                                │
//! │               ▼            ▼                                            │
//! │            Invoice ──1:N── InvoiceLine ──► Product ◄── PurchaseLine     │
//! │               ▲                              ▲              │           │
//! │               │                              │              ▼           │
//! │         StockOperation ──────────────────────┘          Purchase        │
//! │         (invoice_id on SALE entries)                        │           │
//! │                                                             ▼           │
//! │                                                          Supplier       │
//! │                                                                         │
//! │   Every entity: id, created_at, updated_at, deleted_at (soft delete)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Product.stock` is a cache. The authoritative stock of a product is the
//! sum of its `StockOperation.quantity_delta` values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;
use crate::types::{InvoiceStatus, PaymentMethod, StockOperationKind};

// =============================================================================
// Seller
// =============================================================================

/// A staff member authorized to sell.
///
/// The password hash and MFA secret never leave the backend.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Seller {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    /// Unique government id.
    pub national_id: String,
    /// Unique, stored lowercase.
    pub email: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub mfa_secret: Option<String>,
    pub mfa_enabled: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Seller {
    pub fn summary(&self) -> SellerSummary {
        SellerSummary {
            id: self.id,
            name: self.name.clone(),
            last_name: self.last_name.clone(),
            national_id: self.national_id.clone(),
            email: self.email.clone(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}

/// Seller without credentials, embedded in invoice details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SellerSummary {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: String,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    /// Kind of identification document (CC, NIT, CE...).
    pub id_type: String,
    /// Unique identification number.
    pub id_number: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Supplier
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Supplier {
    pub id: i64,
    /// Unique.
    pub name: String,
    pub phone: String,
    pub email: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Product
// =============================================================================

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Unique business code.
    pub code: String,
    pub sale_price_cents: i64,
    /// Cached stock. Equal to the ledger fold once a transaction commits.
    pub stock: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// =============================================================================
// Stock Operation (ledger entry)
// =============================================================================

/// One immutable movement of stock.
///
/// ## Invariants
/// - `resulting_stock` is the product's stock right after this entry
/// - `uuid` is globally unique and never changes across stores
/// - `synchronized` only ever goes from false to true
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockOperation {
    pub id: i64,
    pub uuid: String,
    pub product_id: i64,
    pub kind: StockOperationKind,
    pub quantity_delta: i64,
    pub resulting_stock: i64,
    pub seller_id: i64,
    /// Set on SALE entries once the invoice row exists.
    pub invoice_id: Option<i64>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub synchronized: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StockOperation {
    /// Fresh cross-store identity for a new ledger entry.
    pub fn new_uuid() -> String {
        Uuid::new_v4().to_string()
    }
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    /// `FAC-<n>`, unique.
    pub number: String,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    pub seller_id: i64,
    pub client_id: i64,
    pub subtotal_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,
    pub status: InvoiceStatus,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceLine {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Price at sale time, copied into the line.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row of an invoice listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceSummary {
    pub id: i64,
    pub number: String,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    pub total_cents: i64,
    pub client_name: String,
    pub seller_name: String,
}

/// Invoice line with its product embedded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceLineDetail {
    #[serde(flatten)]
    pub line: InvoiceLine,
    pub product: Product,
}

/// Invoice with client, seller and product lines resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Client,
    pub seller: SellerSummary,
    pub lines: Vec<InvoiceLineDetail>,
}

// =============================================================================
// Purchase
// =============================================================================

/// A stock receipt from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Purchase {
    pub id: i64,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub supplier_id: i64,
    /// Unique together with `supplier_id`.
    pub supplier_invoice_number: String,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseLine {
    pub id: i64,
    pub purchase_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseLineDetail {
    #[serde(flatten)]
    pub line: PurchaseLine,
    pub product: Product,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PurchaseDetail {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub supplier: Supplier,
    pub lines: Vec<PurchaseLineDetail>,
}

// =============================================================================
// Sync Log
// =============================================================================

/// Per-model watermark of the last successful smart sync.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncLogEntry {
    pub model_name: String,
    #[ts(as = "String")]
    pub last_sync_timestamp: DateTime<Utc>,
}
