//! Master-entity rows and the conflict policy of every replicated table.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┬──────────────────────────────────────────┐
//! │ table            │ conflict key             │ on conflict                              │
//! ├──────────────────┼──────────────────────────┼──────────────────────────────────────────┤
//! │ sellers          │ national_id              │ name, last_name, email, password_hash,   │
//! │                  │                          │ updated_at                               │
//! │ clients          │ id_number                │ name, last_name, id_type, phone, email,  │
//! │                  │                          │ address, updated_at                      │
//! │ products         │ code                     │ name, sale_price_cents, stock, updated_at│
//! │ suppliers        │ name                     │ phone, email, updated_at                 │
//! │ invoices         │ number                   │ nothing                                  │
//! │ purchases        │ supplier, supplier inv.  │ nothing                                  │
//! │ stock_operations │ uuid                     │ nothing                                  │
//! └──────────────────┴──────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Rows never carry `id`: ids are store-local and business keys identify
//! rows across stores.

use botica_core::{Client, Product, Seller, Supplier};

use crate::upsert::{ConflictPolicy, UpsertRow};

pub mod policy {
    use super::ConflictPolicy;

    pub fn sellers() -> ConflictPolicy {
        ConflictPolicy::update(
            &["national_id"],
            &["name", "last_name", "email", "password_hash", "updated_at"],
        )
    }

    pub fn clients() -> ConflictPolicy {
        ConflictPolicy::update(
            &["id_number"],
            &["name", "last_name", "id_type", "phone", "email", "address", "updated_at"],
        )
    }

    pub fn products() -> ConflictPolicy {
        ConflictPolicy::update(&["code"], &["name", "sale_price_cents", "stock", "updated_at"])
    }

    pub fn suppliers() -> ConflictPolicy {
        ConflictPolicy::update(&["name"], &["phone", "email", "updated_at"])
    }

    pub fn invoices() -> ConflictPolicy {
        ConflictPolicy::do_nothing(&["number"])
    }

    pub fn purchases() -> ConflictPolicy {
        ConflictPolicy::do_nothing(&["supplier_id", "supplier_invoice_number"])
    }

    pub fn stock_operations() -> ConflictPolicy {
        ConflictPolicy::do_nothing(&["uuid"])
    }
}

pub fn seller_row(seller: &Seller) -> UpsertRow {
    UpsertRow::new()
        .text("name", &seller.name)
        .text("last_name", &seller.last_name)
        .text("national_id", &seller.national_id)
        .text("email", &seller.email)
        .text("password_hash", &seller.password_hash)
        .opt_text("mfa_secret", seller.mfa_secret.clone())
        .flag("mfa_enabled", seller.mfa_enabled)
        .timestamp("created_at", seller.created_at)
        .timestamp("updated_at", seller.updated_at)
        .opt_timestamp("deleted_at", seller.deleted_at)
}

pub fn client_row(client: &Client) -> UpsertRow {
    UpsertRow::new()
        .text("name", &client.name)
        .text("last_name", &client.last_name)
        .text("id_type", &client.id_type)
        .text("id_number", &client.id_number)
        .text("phone", &client.phone)
        .text("email", &client.email)
        .text("address", &client.address)
        .timestamp("created_at", client.created_at)
        .timestamp("updated_at", client.updated_at)
        .opt_timestamp("deleted_at", client.deleted_at)
}

/// Product row carrying its cached stock.
pub fn product_row(product: &Product) -> UpsertRow {
    product_row_with_stock(product, product.stock)
}

/// Product row with an explicit stock value. Pulls use 0: local stock only
/// comes from the local ledger.
pub fn product_row_with_stock(product: &Product, stock: i64) -> UpsertRow {
    UpsertRow::new()
        .text("name", &product.name)
        .text("code", &product.code)
        .int("sale_price_cents", product.sale_price_cents)
        .int("stock", stock)
        .timestamp("created_at", product.created_at)
        .timestamp("updated_at", product.updated_at)
        .opt_timestamp("deleted_at", product.deleted_at)
}

pub fn supplier_row(supplier: &Supplier) -> UpsertRow {
    UpsertRow::new()
        .text("name", &supplier.name)
        .text("phone", &supplier.phone)
        .text("email", &supplier.email)
        .timestamp("created_at", supplier.created_at)
        .timestamp("updated_at", supplier.updated_at)
        .opt_timestamp("deleted_at", supplier.deleted_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::table::Table;
    use crate::upsert::upsert_local;
    use botica_core::ClientData;
    use chrono::Duration;

    #[tokio::test]
    async fn test_last_writer_wins_keeps_newer_local_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let local = db
            .clients()
            .register(&ClientData {
                name: "Local".to_string(),
                last_name: "Mora".to_string(),
                id_type: "CC".to_string(),
                id_number: "77".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut older = local.clone();
        older.name = "Older".to_string();
        older.updated_at = local.updated_at - Duration::minutes(5);
        let mut newer = local.clone();
        newer.name = "Newer".to_string();
        newer.updated_at = local.updated_at + Duration::minutes(5);

        let policy = policy::clients().last_writer_wins();
        let mut conn = db.pool().acquire().await.unwrap();
        let skipped = upsert_local(&mut conn, Table::Clients, &[client_row(&older)], &policy)
            .await
            .unwrap();
        assert_eq!(skipped, 0);
        let applied = upsert_local(&mut conn, Table::Clients, &[client_row(&newer)], &policy)
            .await
            .unwrap();
        assert_eq!(applied, 1);
        drop(conn);

        let stored = db.clients().get(local.id).await.unwrap();
        assert_eq!(stored.name, "Newer");
    }
}
