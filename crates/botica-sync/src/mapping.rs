//! Rows that reference other rows.
//!
//! Headers, lines and ledger entries carry foreign ids that only mean
//! something in the store that assigned them. These rows replace each
//! foreign id with a [`Lookup`] by business key, so the same row resolves
//! correctly in whichever store it is written to.
//!
//! ```text
//! invoice_lines.invoice_id  = (SELECT id FROM invoices WHERE number = $1)
//! purchase_lines.purchase_id = (SELECT id FROM purchases
//!                                WHERE supplier_id = (SELECT id FROM suppliers WHERE name = $1)
//!                                  AND supplier_invoice_number = $2)
//! ```

use botica_core::{Invoice, InvoiceLine, Purchase, PurchaseLine, StockOperation};
use botica_db::upsert::{ConflictPolicy, Lookup, SqlValue, UpsertRow};

/// Lines have no business key. Callers insert them only together with a
/// freshly inserted header; the primary key target never conflicts because
/// rows carry no id.
pub fn line_policy() -> ConflictPolicy {
    ConflictPolicy::do_nothing(&["id"])
}

fn seller(national_id: &str) -> Lookup {
    Lookup::by("sellers", "national_id", national_id)
}

fn client(id_number: &str) -> Lookup {
    Lookup::by("clients", "id_number", id_number)
}

fn supplier(name: &str) -> Lookup {
    Lookup::by("suppliers", "name", name)
}

fn product(code: &str) -> Lookup {
    Lookup::by("products", "code", code)
}

fn invoice(number: &str) -> Lookup {
    Lookup::by("invoices", "number", number)
}

fn purchase(supplier_name: &str, supplier_invoice_number: &str) -> Lookup {
    Lookup {
        table: "purchases",
        keys: vec![("supplier_id", SqlValue::Lookup(Box::new(supplier(supplier_name))))],
    }
    .and(
        "supplier_invoice_number",
        SqlValue::Text(supplier_invoice_number.to_string()),
    )
}

pub fn invoice_row(invoice: &Invoice, seller_national_id: &str, client_id_number: &str) -> UpsertRow {
    UpsertRow::new()
        .text("number", &invoice.number)
        .timestamp("issued_at", invoice.issued_at)
        .lookup("seller_id", seller(seller_national_id))
        .lookup("client_id", client(client_id_number))
        .int("subtotal_cents", invoice.subtotal_cents)
        .int("vat_cents", invoice.vat_cents)
        .int("total_cents", invoice.total_cents)
        .text("status", invoice.status.as_str())
        .text("payment_method", invoice.payment_method.as_str())
        .timestamp("created_at", invoice.created_at)
        .timestamp("updated_at", invoice.updated_at)
        .opt_timestamp("deleted_at", invoice.deleted_at)
}

pub fn invoice_line_row(line: &InvoiceLine, invoice_number: &str, product_code: &str) -> UpsertRow {
    UpsertRow::new()
        .lookup("invoice_id", invoice(invoice_number))
        .lookup("product_id", product(product_code))
        .int("quantity", line.quantity)
        .int("unit_price_cents", line.unit_price_cents)
        .int("line_total_cents", line.line_total_cents)
        .timestamp("created_at", line.created_at)
        .timestamp("updated_at", line.updated_at)
        .opt_timestamp("deleted_at", line.deleted_at)
}

pub fn purchase_row(purchase: &Purchase, supplier_name: &str) -> UpsertRow {
    UpsertRow::new()
        .timestamp("date", purchase.date)
        .lookup("supplier_id", supplier(supplier_name))
        .text("supplier_invoice_number", &purchase.supplier_invoice_number)
        .int("total_cents", purchase.total_cents)
        .timestamp("created_at", purchase.created_at)
        .timestamp("updated_at", purchase.updated_at)
        .opt_timestamp("deleted_at", purchase.deleted_at)
}

pub fn purchase_line_row(
    line: &PurchaseLine,
    supplier_name: &str,
    supplier_invoice_number: &str,
    product_code: &str,
) -> UpsertRow {
    UpsertRow::new()
        .lookup("purchase_id", purchase(supplier_name, supplier_invoice_number))
        .lookup("product_id", product(product_code))
        .int("quantity", line.quantity)
        .int("unit_cost_cents", line.unit_cost_cents)
        .timestamp("created_at", line.created_at)
        .timestamp("updated_at", line.updated_at)
        .opt_timestamp("deleted_at", line.deleted_at)
}

/// Ledger entry for the remote store. The `synchronized` column is always
/// written as 1: a row that reached the remote is, by definition, replicated.
pub fn stock_operation_row(
    operation: &StockOperation,
    product_code: &str,
    seller_national_id: &str,
    invoice_number: Option<&str>,
) -> UpsertRow {
    let row = UpsertRow::new()
        .text("uuid", &operation.uuid)
        .lookup("product_id", product(product_code))
        .text("kind", operation.kind.as_str())
        .int("quantity_delta", operation.quantity_delta)
        .int("resulting_stock", operation.resulting_stock)
        .lookup("seller_id", seller(seller_national_id));
    let row = match invoice_number {
        Some(number) => row.lookup("invoice_id", invoice(number)),
        None => row.opt_int("invoice_id", None),
    };
    row.timestamp("timestamp", operation.timestamp)
        .flag("synchronized", true)
        .timestamp("created_at", operation.created_at)
        .timestamp("updated_at", operation.updated_at)
        .opt_timestamp("deleted_at", operation.deleted_at)
}
