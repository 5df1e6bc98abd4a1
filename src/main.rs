use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use stock_ledger::{
    config::{database, pricing},
    errors::Result,
    ledger::{Ledger, backup, movement, pricing::DiscountTable, report},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stock-ledger",
    about = "Inventory and order ledger maintenance",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create any missing ledger tables
    Init,
    /// Replay the movement log and report discrepancies and low stock
    Check,
    /// Write a JSON snapshot of the whole ledger
    Backup {
        /// Destination file
        file: PathBuf,
    },
    /// Replace the whole ledger with a JSON snapshot
    Restore {
        /// Snapshot file written by `backup`
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one command. `Ok(false)` means the command ran but found problems.
async fn run(command: Commands) -> Result<bool> {
    let pricing_config = pricing::load_default_pricing_config()?;
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database connection established"))?;
    database::create_tables(&db).await?;
    let ledger = Ledger::with_pricing(db, Arc::new(DiscountTable::new(pricing_config)));

    match command {
        Commands::Init => {
            info!("Ledger initialized");
            Ok(true)
        }
        Commands::Check => {
            let discrepancies = movement::reconcile(&ledger).await?;
            for d in &discrepancies {
                warn!(
                    item = ?d.item,
                    item_id = d.item_id,
                    live = d.live,
                    replayed = d.replayed,
                    "Stock does not match movement log"
                );
            }

            let low = report::low_stock(&ledger).await?;
            for m in &low.materials {
                warn!(material_id = m.id, name = %m.name, stock = m.stock, "Material low");
            }
            for p in &low.products {
                warn!(product_id = p.id, name = %p.name, stock = p.stock, "Finished goods low");
            }

            if discrepancies.is_empty() {
                info!("Movement log reconciles with every stock counter");
            }
            Ok(discrepancies.is_empty())
        }
        Commands::Backup { file } => {
            let snapshot = backup::snapshot(&ledger).await?;
            backup::write_snapshot(&file, &snapshot)?;
            Ok(true)
        }
        Commands::Restore { file } => {
            let snapshot = backup::read_snapshot(&file)?;
            backup::restore(&ledger, snapshot).await?;
            Ok(true)
        }
    }
}
