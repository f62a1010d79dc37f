//! # Conflict-Aware Upsert
//!
//! One statement builder for every "insert, or on conflict of a business key
//! update these columns / do nothing" write in the system: CSV batches, the
//! pull side of reconciliation, and every push to the remote store.
//!
//! ## Statement Shape
//! ```text
//! INSERT INTO products (name, code, sale_price_cents, updated_at)
//! VALUES ($1, $2, $3, $4)
//! ON CONFLICT (code) DO UPDATE SET
//!     name = excluded.name, sale_price_cents = excluded.sale_price_cents,
//!     updated_at = excluded.updated_at
//! [WHERE excluded.updated_at > products.updated_at]      ← last writer wins
//! ```
//!
//! Placeholders are `$N` in order of appearance, which both SQLite and
//! Postgres accept, so the same [`Statement`] runs on the local pool and on
//! the remote `AnyPool`.
//!
//! ## Foreign Keys Across Stores
//! Ids are store-local. A [`Lookup`] renders a sub-select that resolves the
//! foreign id by business key in the target store:
//! ```text
//! seller_id = (SELECT id FROM sellers WHERE national_id = $5)
//! ```

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::{Database, Encode, Sqlite, SqliteConnection, Type};

use crate::error::DbResult;
use crate::table::Table;
use crate::timestamp::to_db_text;

// =============================================================================
// Values
// =============================================================================

/// A column value of an upsert row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    OptInt(Option<i64>),
    Text(String),
    OptText(Option<String>),
    /// Foreign id resolved by business key in the target store.
    Lookup(Box<Lookup>),
}

/// `(SELECT id FROM <table> WHERE <k1> = .. AND <k2> = ..)`
///
/// Key values may themselves be lookups (a purchase line finds its purchase
/// through the supplier name plus the supplier invoice number).
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub table: &'static str,
    pub keys: Vec<(&'static str, SqlValue)>,
}

impl Lookup {
    pub fn by(table: &'static str, column: &'static str, value: impl Into<String>) -> Self {
        Lookup {
            table,
            keys: vec![(column, SqlValue::Text(value.into()))],
        }
    }

    pub fn and(mut self, column: &'static str, value: SqlValue) -> Self {
        self.keys.push((column, value));
        self
    }
}

/// A bind parameter after rendering. Only plain scalars reach the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    OptInt(Option<i64>),
    Text(String),
    OptText(Option<String>),
}

// =============================================================================
// Rows and Policy
// =============================================================================

/// One row to upsert, as ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertRow {
    columns: Vec<(&'static str, SqlValue)>,
}

impl UpsertRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int(mut self, column: &'static str, value: i64) -> Self {
        self.columns.push((column, SqlValue::Int(value)));
        self
    }

    pub fn opt_int(mut self, column: &'static str, value: Option<i64>) -> Self {
        self.columns.push((column, SqlValue::OptInt(value)));
        self
    }

    /// Booleans are stored as 0/1 in both stores.
    pub fn flag(self, column: &'static str, value: bool) -> Self {
        self.int(column, i64::from(value))
    }

    pub fn text(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.columns.push((column, SqlValue::Text(value.into())));
        self
    }

    pub fn opt_text(mut self, column: &'static str, value: Option<String>) -> Self {
        self.columns.push((column, SqlValue::OptText(value)));
        self
    }

    pub fn timestamp(self, column: &'static str, at: DateTime<Utc>) -> Self {
        self.text(column, to_db_text(at))
    }

    pub fn opt_timestamp(self, column: &'static str, at: Option<DateTime<Utc>>) -> Self {
        self.opt_text(column, at.map(to_db_text))
    }

    pub fn lookup(mut self, column: &'static str, lookup: Lookup) -> Self {
        self.columns.push((column, SqlValue::Lookup(Box::new(lookup))));
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(c, _)| *c)
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
    DoNothing,
    DoUpdate(Vec<&'static str>),
}

/// Conflict target plus what to do on a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPolicy {
    pub keys: Vec<&'static str>,
    pub action: OnConflict,
    /// Only overwrite when the incoming `updated_at` is newer.
    pub newer_only: bool,
}

impl ConflictPolicy {
    pub fn update(keys: &[&'static str], columns: &[&'static str]) -> Self {
        ConflictPolicy {
            keys: keys.to_vec(),
            action: OnConflict::DoUpdate(columns.to_vec()),
            newer_only: false,
        }
    }

    pub fn do_nothing(keys: &[&'static str]) -> Self {
        ConflictPolicy {
            keys: keys.to_vec(),
            action: OnConflict::DoNothing,
            newer_only: false,
        }
    }

    /// Guards the update with `excluded.updated_at > <table>.updated_at`.
    pub fn last_writer_wins(mut self) -> Self {
        self.newer_only = true;
        self
    }

    /// Same policy without some update columns.
    pub fn without(mut self, skipped: &[&str]) -> Self {
        if let OnConflict::DoUpdate(columns) = &mut self.action {
            columns.retain(|c| !skipped.contains(c));
        }
        self
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Rendered SQL with its binds in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

struct Renderer {
    binds: Vec<BindValue>,
}

impl Renderer {
    fn placeholder(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn value(&mut self, value: &SqlValue) -> String {
        match value {
            SqlValue::Int(v) => self.placeholder(BindValue::Int(*v)),
            SqlValue::OptInt(v) => self.placeholder(BindValue::OptInt(*v)),
            SqlValue::Text(v) => self.placeholder(BindValue::Text(v.clone())),
            SqlValue::OptText(v) => self.placeholder(BindValue::OptText(v.clone())),
            SqlValue::Lookup(lookup) => {
                let conditions: Vec<String> = lookup
                    .keys
                    .iter()
                    .map(|(column, v)| format!("{} = {}", column, self.value(v)))
                    .collect();
                format!(
                    "(SELECT id FROM {} WHERE {})",
                    lookup.table,
                    conditions.join(" AND ")
                )
            }
        }
    }
}

/// Builds the upsert statement for one row.
///
/// ## Example
/// ```rust
/// use botica_db::upsert::{build_upsert, ConflictPolicy, UpsertRow};
///
/// let row = UpsertRow::new().text("uuid", "u-1").int("quantity_delta", -2);
/// let stmt = build_upsert("stock_operations", &row, &ConflictPolicy::do_nothing(&["uuid"]));
/// assert_eq!(
///     stmt.sql,
///     "INSERT INTO stock_operations (uuid, quantity_delta) VALUES ($1, $2) \
///      ON CONFLICT (uuid) DO NOTHING"
/// );
/// ```
pub fn build_upsert(table: &str, row: &UpsertRow, policy: &ConflictPolicy) -> Statement {
    let mut renderer = Renderer { binds: Vec::new() };

    let columns: Vec<&str> = row.columns().collect();
    let values: Vec<String> = row.columns.iter().map(|(_, v)| renderer.value(v)).collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) ",
        table,
        columns.join(", "),
        values.join(", "),
        policy.keys.join(", ")
    );

    match &policy.action {
        OnConflict::DoNothing => sql.push_str("DO NOTHING"),
        OnConflict::DoUpdate(update) => {
            let assignments: Vec<String> = update
                .iter()
                .map(|c| format!("{} = excluded.{}", c, c))
                .collect();
            sql.push_str("DO UPDATE SET ");
            sql.push_str(&assignments.join(", "));
            if policy.newer_only {
                sql.push_str(&format!(" WHERE excluded.updated_at > {}.updated_at", table));
            }
        }
    }

    Statement {
        sql,
        binds: renderer.binds,
    }
}

/// Binds rendered values onto a query of any driver that encodes the four
/// scalar shapes.
pub fn bind_all<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    binds: &[BindValue],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    i64: Encode<'q, DB> + Type<DB>,
    Option<i64>: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
{
    for bind in binds {
        query = match bind {
            BindValue::Int(v) => query.bind(*v),
            BindValue::OptInt(v) => query.bind(*v),
            BindValue::Text(v) => query.bind(v.clone()),
            BindValue::OptText(v) => query.bind(v.clone()),
        };
    }
    query
}

// =============================================================================
// Local Execution
// =============================================================================

/// Upserts rows into a local table, one statement per row, on the caller's
/// connection or transaction.
///
/// ## Returns
/// Number of rows inserted or updated. Rows skipped by `DO NOTHING` or by
/// the last-writer-wins guard do not count.
pub async fn upsert_local(
    conn: &mut SqliteConnection,
    table: Table,
    rows: &[UpsertRow],
    policy: &ConflictPolicy,
) -> DbResult<u64> {
    let mut affected = 0;
    for row in rows {
        let stmt = build_upsert(table.name(), row, policy);
        let result = bind_all(sqlx::query::<Sqlite>(&stmt.sql), &stmt.binds)
            .execute(&mut *conn)
            .await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_with_last_writer_wins() {
        let row = UpsertRow::new()
            .text("national_id", "1020")
            .text("name", "Ana")
            .text("updated_at", "2025-01-01T00:00:00.000Z");
        let policy = ConflictPolicy::update(&["national_id"], &["name", "updated_at"]).last_writer_wins();

        let stmt = build_upsert("sellers", &row, &policy);
        assert_eq!(
            stmt.sql,
            "INSERT INTO sellers (national_id, name, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (national_id) DO UPDATE SET name = excluded.name, \
             updated_at = excluded.updated_at \
             WHERE excluded.updated_at > sellers.updated_at"
        );
        assert_eq!(stmt.binds.len(), 3);
    }

    #[test]
    fn test_nested_lookup_numbers_placeholders_in_order() {
        let purchase = Lookup {
            table: "purchases",
            keys: vec![
                (
                    "supplier_id",
                    SqlValue::Lookup(Box::new(Lookup::by("suppliers", "name", "Drogas SA"))),
                ),
                ("supplier_invoice_number", SqlValue::Text("F-77".into())),
            ],
        };
        let row = UpsertRow::new()
            .lookup("purchase_id", purchase)
            .lookup("product_id", Lookup::by("products", "code", "A"))
            .int("quantity", 10);

        let stmt = build_upsert("purchase_lines", &row, &ConflictPolicy::do_nothing(&["id"]));
        assert!(stmt.sql.contains(
            "(SELECT id FROM purchases WHERE supplier_id = (SELECT id FROM suppliers WHERE name = $1) \
             AND supplier_invoice_number = $2)"
        ));
        assert!(stmt.sql.contains("(SELECT id FROM products WHERE code = $3), $4)"));
        assert_eq!(
            stmt.binds,
            vec![
                BindValue::Text("Drogas SA".into()),
                BindValue::Text("F-77".into()),
                BindValue::Text("A".into()),
                BindValue::Int(10),
            ]
        );
    }

    #[test]
    fn test_without_drops_update_columns() {
        let policy = ConflictPolicy::update(&["code"], &["name", "sale_price_cents", "stock"]).without(&["stock"]);
        assert_eq!(policy.action, OnConflict::DoUpdate(vec!["name", "sale_price_cents"]));
    }
}
