//! Remote reads.
//!
//! `AnyRow` decodes only plain scalars, so every entity is assembled by hand
//! from `i64`/`String` columns. Foreign ids of remote rows mean nothing
//! locally; each fetch joins in the business keys the local side resolves
//! them with.

use botica_core::{
    Client, Invoice, InvoiceLine, Product, Seller, StockOperation, Supplier, SYSTEM_SELLER_NATIONAL_ID,
};
use botica_db::timestamp::{parse_db_text, to_db_text};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Decoding
// =============================================================================

struct Decoder<'r> {
    row: &'r AnyRow,
    table: &'static str,
}

impl<'r> Decoder<'r> {
    fn new(row: &'r AnyRow, table: &'static str) -> Self {
        Decoder { row, table }
    }

    fn int(&self, column: &str) -> SyncResult<i64> {
        self.row
            .try_get::<i64, _>(column)
            .map_err(|e| SyncError::decode(self.table, format!("{}: {}", column, e)))
    }

    fn opt_int(&self, column: &str) -> SyncResult<Option<i64>> {
        self.row
            .try_get::<Option<i64>, _>(column)
            .map_err(|e| SyncError::decode(self.table, format!("{}: {}", column, e)))
    }

    fn text(&self, column: &str) -> SyncResult<String> {
        self.row
            .try_get::<String, _>(column)
            .map_err(|e| SyncError::decode(self.table, format!("{}: {}", column, e)))
    }

    fn opt_text(&self, column: &str) -> SyncResult<Option<String>> {
        self.row
            .try_get::<Option<String>, _>(column)
            .map_err(|e| SyncError::decode(self.table, format!("{}: {}", column, e)))
    }

    fn flag(&self, column: &str) -> SyncResult<bool> {
        Ok(self.int(column)? != 0)
    }

    fn timestamp(&self, column: &str) -> SyncResult<DateTime<Utc>> {
        parse_db_text(&self.text(column)?).map_err(|e| SyncError::decode(self.table, e))
    }

    fn opt_timestamp(&self, column: &str) -> SyncResult<Option<DateTime<Utc>>> {
        self.opt_text(column)?
            .map(|text| parse_db_text(&text).map_err(|e| SyncError::decode(self.table, e)))
            .transpose()
    }

    fn parsed<T>(&self, column: &str) -> SyncResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(column)?
            .parse()
            .map_err(|e: T::Err| SyncError::decode(self.table, format!("{}: {}", column, e)))
    }
}

pub fn seller(row: &AnyRow) -> SyncResult<Seller> {
    let d = Decoder::new(row, "sellers");
    Ok(Seller {
        id: d.int("id")?,
        name: d.text("name")?,
        last_name: d.text("last_name")?,
        national_id: d.text("national_id")?,
        email: d.text("email")?,
        password_hash: d.text("password_hash")?,
        mfa_secret: d.opt_text("mfa_secret")?,
        mfa_enabled: d.flag("mfa_enabled")?,
        created_at: d.timestamp("created_at")?,
        updated_at: d.timestamp("updated_at")?,
        deleted_at: d.opt_timestamp("deleted_at")?,
    })
}

pub fn client(row: &AnyRow) -> SyncResult<Client> {
    let d = Decoder::new(row, "clients");
    Ok(Client {
        id: d.int("id")?,
        name: d.text("name")?,
        last_name: d.text("last_name")?,
        id_type: d.text("id_type")?,
        id_number: d.text("id_number")?,
        phone: d.text("phone")?,
        email: d.text("email")?,
        address: d.text("address")?,
        created_at: d.timestamp("created_at")?,
        updated_at: d.timestamp("updated_at")?,
        deleted_at: d.opt_timestamp("deleted_at")?,
    })
}

pub fn supplier(row: &AnyRow) -> SyncResult<Supplier> {
    let d = Decoder::new(row, "suppliers");
    Ok(Supplier {
        id: d.int("id")?,
        name: d.text("name")?,
        phone: d.text("phone")?,
        email: d.text("email")?,
        created_at: d.timestamp("created_at")?,
        updated_at: d.timestamp("updated_at")?,
        deleted_at: d.opt_timestamp("deleted_at")?,
    })
}

pub fn product(row: &AnyRow) -> SyncResult<Product> {
    let d = Decoder::new(row, "products");
    Ok(Product {
        id: d.int("id")?,
        name: d.text("name")?,
        code: d.text("code")?,
        sale_price_cents: d.int("sale_price_cents")?,
        stock: d.int("stock")?,
        created_at: d.timestamp("created_at")?,
        updated_at: d.timestamp("updated_at")?,
        deleted_at: d.opt_timestamp("deleted_at")?,
    })
}

// =============================================================================
// Rows With Business Keys
// =============================================================================

/// Remote invoice plus the keys of the seller and client it references.
#[derive(Debug, Clone)]
pub struct RemoteInvoice {
    pub invoice: Invoice,
    pub seller_national_id: String,
    pub client_id_number: String,
}

#[derive(Debug, Clone)]
pub struct RemoteInvoiceLine {
    pub line: InvoiceLine,
    pub invoice_number: String,
    pub product_code: String,
}

#[derive(Debug, Clone)]
pub struct RemoteStockOperation {
    pub operation: StockOperation,
    pub product_code: String,
    pub seller_national_id: String,
    pub invoice_number: Option<String>,
}

fn invoice(row: &AnyRow) -> SyncResult<RemoteInvoice> {
    let d = Decoder::new(row, "invoices");
    Ok(RemoteInvoice {
        invoice: Invoice {
            id: d.int("id")?,
            number: d.text("number")?,
            issued_at: d.timestamp("issued_at")?,
            seller_id: d.int("seller_id")?,
            client_id: d.int("client_id")?,
            subtotal_cents: d.int("subtotal_cents")?,
            vat_cents: d.int("vat_cents")?,
            total_cents: d.int("total_cents")?,
            status: d.parsed("status")?,
            payment_method: d.parsed("payment_method")?,
            created_at: d.timestamp("created_at")?,
            updated_at: d.timestamp("updated_at")?,
            deleted_at: d.opt_timestamp("deleted_at")?,
        },
        seller_national_id: d.text("seller_national_id")?,
        client_id_number: d.text("client_id_number")?,
    })
}

fn invoice_line(row: &AnyRow) -> SyncResult<RemoteInvoiceLine> {
    let d = Decoder::new(row, "invoice_lines");
    Ok(RemoteInvoiceLine {
        line: InvoiceLine {
            id: d.int("id")?,
            invoice_id: d.int("invoice_id")?,
            product_id: d.int("product_id")?,
            quantity: d.int("quantity")?,
            unit_price_cents: d.int("unit_price_cents")?,
            line_total_cents: d.int("line_total_cents")?,
            created_at: d.timestamp("created_at")?,
            updated_at: d.timestamp("updated_at")?,
            deleted_at: d.opt_timestamp("deleted_at")?,
        },
        invoice_number: d.text("invoice_number")?,
        product_code: d.text("product_code")?,
    })
}

fn stock_operation(row: &AnyRow) -> SyncResult<RemoteStockOperation> {
    let d = Decoder::new(row, "stock_operations");
    Ok(RemoteStockOperation {
        operation: StockOperation {
            id: d.int("id")?,
            uuid: d.text("uuid")?,
            product_id: d.int("product_id")?,
            kind: d.parsed("kind")?,
            quantity_delta: d.int("quantity_delta")?,
            resulting_stock: d.int("resulting_stock")?,
            seller_id: d.int("seller_id")?,
            invoice_id: d.opt_int("invoice_id")?,
            timestamp: d.timestamp("timestamp")?,
            synchronized: d.flag("synchronized")?,
            created_at: d.timestamp("created_at")?,
            updated_at: d.timestamp("updated_at")?,
            deleted_at: d.opt_timestamp("deleted_at")?,
        },
        product_code: d.text("product_code")?,
        seller_national_id: d.text("seller_national_id")?,
        invoice_number: d.opt_text("invoice_number")?,
    })
}

// =============================================================================
// Fetches
// =============================================================================

/// `WHERE` fragment for an optional watermark on `updated_at`.
///
/// `$1 IS NULL` cannot be typed by postgres, so the filter is left out
/// instead of bound as NULL.
fn since_filter(since: Option<DateTime<Utc>>, first_placeholder: usize) -> (String, Option<String>) {
    match since {
        Some(at) => (format!(" AND updated_at > ${}", first_placeholder), Some(to_db_text(at))),
        None => (String::new(), None),
    }
}

/// Business sellers (the system actor excluded), changed after `since`.
pub async fn sellers(pool: &AnyPool, since: Option<DateTime<Utc>>) -> SyncResult<Vec<Seller>> {
    let (filter, watermark) = since_filter(since, 2);
    let sql = format!("SELECT * FROM sellers WHERE national_id <> $1{} ORDER BY id", filter);
    let mut query = sqlx::query(&sql).bind(SYSTEM_SELLER_NATIONAL_ID);
    if let Some(at) = watermark {
        query = query.bind(at);
    }
    query.fetch_all(pool).await?.iter().map(seller).collect()
}

pub async fn business_seller_count(pool: &AnyPool) -> SyncResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sellers WHERE deleted_at IS NULL AND national_id <> $1",
    )
    .bind(SYSTEM_SELLER_NATIONAL_ID)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn seller_by_email(pool: &AnyPool, email: &str) -> SyncResult<Option<Seller>> {
    let row = sqlx::query("SELECT * FROM sellers WHERE email = $1 AND deleted_at IS NULL")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(seller).transpose()
}

async fn masters<T>(
    pool: &AnyPool,
    table: &str,
    since: Option<DateTime<Utc>>,
    decode: fn(&AnyRow) -> SyncResult<T>,
) -> SyncResult<Vec<T>> {
    let (filter, watermark) = since_filter(since, 1);
    let sql = format!("SELECT * FROM {} WHERE 1 = 1{} ORDER BY id", table, filter);
    let mut query = sqlx::query(&sql);
    if let Some(at) = watermark {
        query = query.bind(at);
    }
    query.fetch_all(pool).await?.iter().map(decode).collect()
}

pub async fn clients(pool: &AnyPool, since: Option<DateTime<Utc>>) -> SyncResult<Vec<Client>> {
    masters(pool, "clients", since, client).await
}

pub async fn suppliers(pool: &AnyPool, since: Option<DateTime<Utc>>) -> SyncResult<Vec<Supplier>> {
    masters(pool, "suppliers", since, supplier).await
}

pub async fn products(pool: &AnyPool, since: Option<DateTime<Utc>>) -> SyncResult<Vec<Product>> {
    masters(pool, "products", since, product).await
}

pub async fn invoices(pool: &AnyPool) -> SyncResult<Vec<RemoteInvoice>> {
    let rows = sqlx::query(
        "SELECT i.*, s.national_id AS seller_national_id, c.id_number AS client_id_number \
         FROM invoices i JOIN sellers s ON s.id = i.seller_id JOIN clients c ON c.id = i.client_id \
         ORDER BY i.id",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(invoice).collect()
}

pub async fn invoice_lines(pool: &AnyPool, invoice_number: &str) -> SyncResult<Vec<RemoteInvoiceLine>> {
    let rows = sqlx::query(
        "SELECT l.*, i.number AS invoice_number, p.code AS product_code \
         FROM invoice_lines l JOIN invoices i ON i.id = l.invoice_id JOIN products p ON p.id = l.product_id \
         WHERE i.number = $1 ORDER BY l.id",
    )
    .bind(invoice_number)
    .fetch_all(pool)
    .await?;
    rows.iter().map(invoice_line).collect()
}

/// Every remote ledger entry in remote insertion order.
pub async fn stock_operations(pool: &AnyPool) -> SyncResult<Vec<RemoteStockOperation>> {
    let rows = sqlx::query(
        "SELECT o.*, p.code AS product_code, s.national_id AS seller_national_id, i.number AS invoice_number \
         FROM stock_operations o JOIN products p ON p.id = o.product_id JOIN sellers s ON s.id = o.seller_id \
         LEFT JOIN invoices i ON i.id = o.invoice_id \
         WHERE o.deleted_at IS NULL ORDER BY o.id",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(stock_operation).collect()
}

pub async fn stock_operation_by_uuid(pool: &AnyPool, uuid: &str) -> SyncResult<Option<RemoteStockOperation>> {
    let row = sqlx::query(
        "SELECT o.*, p.code AS product_code, s.national_id AS seller_national_id, i.number AS invoice_number \
         FROM stock_operations o JOIN products p ON p.id = o.product_id JOIN sellers s ON s.id = o.seller_id \
         LEFT JOIN invoices i ON i.id = o.invoice_id WHERE o.uuid = $1",
    )
    .bind(uuid)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(stock_operation).transpose()
}

pub async fn count(pool: &AnyPool, table: &str) -> SyncResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_filter_only_binds_a_watermark() {
        let (filter, bind) = since_filter(None, 1);
        assert!(filter.is_empty());
        assert!(bind.is_none());

        let at = DateTime::parse_from_rfc3339("2025-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let (filter, bind) = since_filter(Some(at), 2);
        assert_eq!(filter, " AND updated_at > $2");
        assert_eq!(bind.as_deref(), Some("2025-05-01T10:00:00.000Z"));
    }
}
