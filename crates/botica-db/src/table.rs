//! Table names of the local schema, in foreign-key order.

use std::fmt;

/// A table of the local schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Sellers,
    Clients,
    Suppliers,
    Products,
    Invoices,
    InvoiceLines,
    Purchases,
    PurchaseLines,
    StockOperations,
    SyncLog,
}

impl Table {
    /// Drop order used by `deep_reset`: lines, headers, primary entities,
    /// ledger, then bookkeeping.
    ///
    /// The ledger references products, sellers and invoices; foreign keys
    /// are switched off for the duration of the reset, so only the creation
    /// order (the migrations) has to respect them.
    pub const RESET_ORDER: [Table; 10] = [
        Table::InvoiceLines,
        Table::PurchaseLines,
        Table::Invoices,
        Table::Purchases,
        Table::Sellers,
        Table::Clients,
        Table::Suppliers,
        Table::Products,
        Table::StockOperations,
        Table::SyncLog,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Table::Sellers => "sellers",
            Table::Clients => "clients",
            Table::Suppliers => "suppliers",
            Table::Products => "products",
            Table::Invoices => "invoices",
            Table::InvoiceLines => "invoice_lines",
            Table::Purchases => "purchases",
            Table::PurchaseLines => "purchase_lines",
            Table::StockOperations => "stock_operations",
            Table::SyncLog => "sync_log",
        }
    }

    /// Entity name used in `NotFound` errors.
    pub const fn entity(&self) -> &'static str {
        match self {
            Table::Sellers => "Seller",
            Table::Clients => "Client",
            Table::Suppliers => "Supplier",
            Table::Products => "Product",
            Table::Invoices => "Invoice",
            Table::InvoiceLines => "InvoiceLine",
            Table::Purchases => "Purchase",
            Table::PurchaseLines => "PurchaseLine",
            Table::StockOperations => "StockOperation",
            Table::SyncLog => "SyncLog",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
