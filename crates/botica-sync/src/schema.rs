//! Remote schema.
//!
//! Same tables and business keys as the local store, without the
//! bookkeeping table. Every column is written explicitly by the upserts, so
//! there are no defaults to keep in step between dialects. Integers are
//! 64-bit and timestamps are text in both dialects, which keeps rows
//! decodable through `AnyRow` with plain `i64` and `String`.

use botica_core::{SYSTEM_SELLER_ID, SYSTEM_SELLER_NATIONAL_ID};

/// SQL flavour behind `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Picks the dialect from a URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            Dialect::Postgres => "id BIGSERIAL PRIMARY KEY",
            Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

/// Drop order: children before the rows they reference.
pub const DROP_ORDER: [&str; 9] = [
    "invoice_lines",
    "purchase_lines",
    "stock_operations",
    "invoices",
    "purchases",
    "sellers",
    "clients",
    "suppliers",
    "products",
];

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sellers (
        {id},
        name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        national_id TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        mfa_secret TEXT,
        mfa_enabled BIGINT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS clients (
        {id},
        name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        id_type TEXT NOT NULL,
        id_number TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        email TEXT NOT NULL,
        address TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS suppliers (
        {id},
        name TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        email TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS products (
        {id},
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        sale_price_cents BIGINT NOT NULL,
        stock BIGINT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS invoices (
        {id},
        number TEXT NOT NULL UNIQUE,
        issued_at TEXT NOT NULL,
        seller_id BIGINT NOT NULL REFERENCES sellers(id),
        client_id BIGINT NOT NULL REFERENCES clients(id),
        subtotal_cents BIGINT NOT NULL,
        vat_cents BIGINT NOT NULL,
        total_cents BIGINT NOT NULL,
        status TEXT NOT NULL,
        payment_method TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS purchases (
        {id},
        date TEXT NOT NULL,
        supplier_id BIGINT NOT NULL REFERENCES suppliers(id),
        supplier_invoice_number TEXT NOT NULL,
        total_cents BIGINT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT,
        UNIQUE (supplier_id, supplier_invoice_number)
    )",
    "CREATE TABLE IF NOT EXISTS invoice_lines (
        {id},
        invoice_id BIGINT NOT NULL REFERENCES invoices(id),
        product_id BIGINT NOT NULL REFERENCES products(id),
        quantity BIGINT NOT NULL,
        unit_price_cents BIGINT NOT NULL,
        line_total_cents BIGINT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS purchase_lines (
        {id},
        purchase_id BIGINT NOT NULL REFERENCES purchases(id),
        product_id BIGINT NOT NULL REFERENCES products(id),
        quantity BIGINT NOT NULL,
        unit_cost_cents BIGINT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS stock_operations (
        {id},
        uuid TEXT NOT NULL UNIQUE,
        product_id BIGINT NOT NULL REFERENCES products(id),
        kind TEXT NOT NULL,
        quantity_delta BIGINT NOT NULL,
        resulting_stock BIGINT NOT NULL,
        seller_id BIGINT NOT NULL REFERENCES sellers(id),
        invoice_id BIGINT REFERENCES invoices(id),
        timestamp TEXT NOT NULL,
        synchronized BIGINT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    )",
];

/// `CREATE TABLE` statements in dependency order.
pub fn create_statements(dialect: Dialect) -> Vec<String> {
    TABLES
        .iter()
        .map(|sql| sql.replace("{id}", dialect.id_column()))
        .collect()
}

/// Seeds the system seller so ledger entries owned by it resolve remotely.
///
/// Sqlite keeps the local id; postgres assigns its own.
pub fn seed_system_seller(dialect: Dialect) -> String {
    let (id_column, id_value) = match dialect {
        Dialect::Sqlite => ("id, ", format!("{}, ", SYSTEM_SELLER_ID)),
        Dialect::Postgres => ("", String::new()),
    };
    format!(
        "INSERT INTO sellers ({}name, last_name, national_id, email, password_hash, mfa_enabled, created_at, updated_at) \
         VALUES ({}'Sistema', 'Botica', '{}', 'system@botica.local', '!', 0, \
         '1970-01-01T00:00:00.000Z', '1970-01-01T00:00:00.000Z') \
         ON CONFLICT (national_id) DO NOTHING",
        id_column, id_value, SYSTEM_SELLER_NATIONAL_ID
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_id_columns() {
        let pg = create_statements(Dialect::Postgres);
        let lite = create_statements(Dialect::Sqlite);
        assert_eq!(pg.len(), 9);
        assert!(pg[0].contains("BIGSERIAL PRIMARY KEY"));
        assert!(lite[0].contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(lite.iter().all(|s| !s.contains("{id}")));
    }

    #[test]
    fn test_dialect_from_scheme() {
        assert_eq!(Dialect::from_scheme("postgresql"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_scheme("sqlite"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_scheme("mysql"), None);
    }

    #[test]
    fn test_seed_keeps_local_id_on_sqlite() {
        assert!(seed_system_seller(Dialect::Sqlite).starts_with("INSERT INTO sellers (id, name"));
        assert!(seed_system_seller(Dialect::Postgres).contains("VALUES ('Sistema'"));
    }
}
