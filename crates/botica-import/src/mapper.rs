//! Raw CSV rows to typed records.
//!
//! Mapping is pure: no store access. A failed row becomes one
//! `row N: <reason>` entry in the import log.

use std::collections::HashMap;

use botica_core::validation::parse_stock;
use botica_core::{ClientData, Money, ProductData, ValidationError};

use crate::target::ImportTarget;

/// One data row keyed by lowercased header. `line` is 1-based, header
/// excluded.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: usize,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize, headers: &[String], record: &csv::StringRecord) -> Self {
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.trim().to_string()))
            .collect();
        RawRow { line, fields }
    }

    fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }
}

/// A row that passed mapping.
#[derive(Debug, Clone)]
pub enum Record {
    Product(ProductData),
    Client(ClientData),
}

impl Record {
    /// Business key, for logs.
    pub fn key(&self) -> &str {
        match self {
            Record::Product(p) => &p.code,
            Record::Client(c) => &c.id_number,
        }
    }
}

/// A typed record with the row it came from.
#[derive(Debug, Clone)]
pub struct Mapped {
    pub line: usize,
    pub record: Record,
}

pub fn map_row(target: ImportTarget, row: &RawRow) -> Result<Mapped, ValidationError> {
    let record = match target {
        ImportTarget::Products => Record::Product(map_product(row)?),
        ImportTarget::Clients => Record::Client(map_client(row)?),
    };
    Ok(Mapped { line: row.line, record })
}

fn map_product(row: &RawRow) -> Result<ProductData, ValidationError> {
    let product = ProductData {
        name: row.field("nombre").to_string(),
        code: row.field("codigo").to_string(),
        sale_price_cents: Money::parse(row.field("precio_venta"), "precio_venta")?.cents(),
        stock: parse_stock("stock", row.field("stock"))?,
    };
    product.validate()?;
    Ok(product)
}

fn map_client(row: &RawRow) -> Result<ClientData, ValidationError> {
    let client = ClientData {
        name: row.field("nombre").to_string(),
        last_name: row.field("apellido").to_string(),
        id_type: row.field("tipo_id").to_string(),
        id_number: row.field("numero_id").to_string(),
        phone: row.field("telefono").to_string(),
        email: row.field("email").to_string(),
        address: row.field("direccion").to_string(),
    };
    client.validate()?;
    Ok(client)
}
