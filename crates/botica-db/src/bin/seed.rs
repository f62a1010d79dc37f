//! # Seed Data Generator
//!
//! Fills a local store with demo products, clients and suppliers.
//!
//! ## Usage
//! ```bash
//! cargo run -p botica-db --bin seed
//! cargo run -p botica-db --bin seed -- --products 500 --db ./data/botica.db
//! ```
//!
//! Product stock is registered through the ledger, so every seeded product
//! starts with one INITIAL entry.

use std::path::PathBuf;
use std::time::Instant;

use botica_core::{ClientData, PageRequest, ProductData, SupplierData};
use botica_db::{Database, DbConfig};
use clap::Parser;

const MEDICINES: &[&str] = &[
    "Acetaminofen",
    "Ibuprofeno",
    "Amoxicilina",
    "Loratadina",
    "Omeprazol",
    "Naproxeno",
    "Diclofenaco",
    "Metformina",
    "Losartan",
    "Salbutamol",
    "Cetirizina",
    "Ranitidina",
    "Azitromicina",
    "Dexametasona",
    "Clotrimazol",
];

const PRESENTATIONS: &[(&str, &str, i64)] = &[
    ("TAB", "500 mg x 10 tabletas", 0),
    ("CAP", "250 mg x 20 capsulas", 350),
    ("JAR", "jarabe 120 ml", 800),
    ("SUS", "suspension 60 ml", 650),
    ("CRM", "crema 30 g", 1200),
];

const CLIENTS: &[(&str, &str)] = &[
    ("Ana", "Rojas"),
    ("Luis", "Pardo"),
    ("Marta", "Gil"),
    ("Jorge", "Vega"),
    ("Sofia", "Castro"),
];

const SUPPLIERS: &[&str] = &["Medisur", "Farmadis", "Droguerias Unidas"];

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Botica POS seed data generator")]
struct Args {
    /// Local database file
    #[arg(short, long, default_value = "./botica_dev.db")]
    db: PathBuf,

    /// Number of products to generate
    #[arg(short, long, default_value_t = 75)]
    products: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Botica POS seed data generator");
    println!("Database: {}", args.db.display());

    let db = Database::new(DbConfig::new(&args.db)).await?;

    let existing = db.products().paginated(&PageRequest::new(1, 1)).await?.total_records;
    if existing > 0 {
        println!("Database already has {} products, skipping.", existing);
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let start = Instant::now();
    let mut generated = 0;

    'outer: for (medicine_idx, medicine) in MEDICINES.iter().enumerate() {
        for (presentation_idx, (prefix, description, price_addon)) in PRESENTATIONS.iter().enumerate() {
            if generated >= args.products {
                break 'outer;
            }
            let seed = medicine_idx * PRESENTATIONS.len() + presentation_idx;
            let product = ProductData {
                name: format!("{} {}", medicine, description),
                code: format!("{}-{:04}", prefix, seed),
                sale_price_cents: 1500 + ((seed as i64 * 37) % 4000) + price_addon,
                stock: (seed % 60) as i64,
            };
            if let Err(e) = db.products().register(&product).await {
                eprintln!("Failed to insert {}: {}", product.code, e);
                continue;
            }
            generated += 1;
        }
    }

    for (idx, (name, last_name)) in CLIENTS.iter().enumerate() {
        db.clients()
            .register(&ClientData {
                name: name.to_string(),
                last_name: last_name.to_string(),
                id_type: "CC".to_string(),
                id_number: format!("{}", 1_000_000 + idx),
                phone: format!("300{:07}", idx),
                email: format!("{}.{}@example.com", name.to_lowercase(), last_name.to_lowercase()),
                address: format!("Calle {} # {}-{}", 10 + idx, idx + 1, 20 + idx),
            })
            .await?;
    }

    for name in SUPPLIERS {
        db.suppliers()
            .register(&SupplierData {
                name: name.to_string(),
                ..Default::default()
            })
            .await?;
    }

    let report = db.ledger().normalize_all().await?;

    println!(
        "Generated {} products, {} clients, {} suppliers in {:?}",
        generated,
        CLIENTS.len(),
        SUPPLIERS.len(),
        start.elapsed()
    );
    println!("Ledger check: {} products, {} corrections", report.products, report.corrections.len());

    db.close().await;
    Ok(())
}
