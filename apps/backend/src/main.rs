//! # Botica Admin CLI
//!
//! ## Usage
//! ```bash
//! botica bootstrap
//! botica import ./productos.csv products
//! botica normalize
//! botica sync
//! botica reset --yes
//! botica --db ./data/botica.db normalize
//! ```
//!
//! Configuration comes from the environment (see [`botica_backend::config`]).

use std::path::PathBuf;

use anyhow::{bail, Context};
use botica_backend::{init_tracing, AppConfig, Backend};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "botica", about = "Botica POS backend administration", version)]
struct Cli {
    /// Local database file, overrides BOTICA_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open both stores and wait for the initial reconcile
    Bootstrap,

    /// Load a CSV file into products or clients
    Import {
        path: PathBuf,
        /// `products` or `clients`
        target: String,
    },

    /// Recompute every product stock from the ledger
    Normalize,

    /// Run one smart sync against the remote store
    Sync,

    /// Wipe the local store, and the remote one when reachable
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    info!(db = %config.db_path.display(), "Opening stores");
    let backend = Backend::open(config).await?;

    let outcome = run(&backend, cli.command).await;
    // Shutdown cancels pushes still in flight.
    backend.agent().flush().await;
    backend.shutdown().await;
    outcome
}

async fn run(backend: &Backend, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Bootstrap => match backend.reconcile_in_background() {
            Some(handle) => match handle.await? {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => bail!("initial reconcile failed, see the log"),
            },
            None => println!("offline: nothing to reconcile"),
        },
        Command::Import { path, target } => {
            let (summary, mut progress) = backend.import_csv(&path, &target).await?;
            while let Some(line) = progress.recv().await {
                println!("{}", line);
            }
            for error in &summary.failed_errors {
                eprintln!("  {}", error);
            }
        }
        Command::Normalize => {
            let report = backend.normalize_all_stocks().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Sync => {
            let report = backend.smart_sync().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("reset wipes every record; pass --yes to confirm");
            }
            let report = backend.reset_all_data().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
