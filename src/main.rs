use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use holiday_ingest::apis::create_sources;
use holiday_ingest::config::Config;
use holiday_ingest::logging;
use holiday_ingest::observability::metrics;
use holiday_ingest::pipeline::storage::{HolidayStore, InMemoryStore, SqliteStore};
use holiday_ingest::pipeline::{default_years, IngestionPipeline};

#[derive(Parser)]
#[command(name = "holiday_ingest")]
#[command(about = "Aggregate, deduplicate and store holidays from multiple sources")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file. Defaults plus environment keys when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, deduplicate and persist holidays
    Refresh {
        /// Years to ingest (repeatable). Defaults to the current year plus `pipeline.years_ahead`.
        #[arg(long = "year")]
        years: Vec<i32>,
        /// SQLite database path, overriding `store.database_path`
        #[arg(long, conflicts_with = "in_memory")]
        database: Option<PathBuf>,
        /// Keep results in memory only (dry run)
        #[arg(long)]
        in_memory: bool,
        /// Serve Prometheus metrics on this address while running
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
        /// Print the per-year summaries as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured sources and whether they can run
    Sources,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let _log_guard = logging::init_logging(&config.logging.directory);

    match cli.command {
        Commands::Sources => {
            println!("📋 Configured sources:");
            for source in create_sources(&config) {
                match source.missing_configuration() {
                    Some(reason) => {
                        println!("   ⚠️  {} (disabled: {})", source.source_id(), reason)
                    }
                    None => println!("   ✅ {}", source.source_id()),
                }
            }
        }
        Commands::Refresh {
            years,
            database,
            in_memory,
            metrics_addr,
            json,
        } => {
            if let Some(addr) = metrics_addr {
                metrics::install_prometheus(addr)?;
            }

            let store: Arc<dyn HolidayStore> = if in_memory {
                info!("Using in-memory store, nothing will be persisted");
                Arc::new(InMemoryStore::new())
            } else {
                let path = database.unwrap_or_else(|| PathBuf::from(&config.store.database_path));
                info!("Using SQLite store at {}", path.display());
                Arc::new(SqliteStore::open(&path)?)
            };

            let pipeline = IngestionPipeline::from_config(&config, store)?;
            let cancel = pipeline.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    cancel.cancel();
                }
            });

            let years = if years.is_empty() {
                default_years(Utc::now().year(), config.pipeline.years_ahead)
            } else {
                years
            };

            println!("🔄 Refreshing holidays for {:?}...", years);
            let total = match pipeline.refresh_years(&years).await {
                Ok(total) => total,
                Err(e) => {
                    error!("Holiday refresh failed: {}", e);
                    return Err(e.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&total)?);
            } else {
                for year in &total.years {
                    println!("\n📊 {}:", year.year);
                    println!("   Fetched: {}", year.fetched);
                    println!("   Rejected: {}", year.rejected);
                    println!("   Canonical: {}", year.canonical);
                    println!("   Created: {}", year.created);
                    println!("   Updated: {}", year.updated);
                    println!("   Unchanged: {}", year.unchanged);
                    if year.failed > 0 {
                        println!("   Failed: {}", year.failed);
                    }
                    if !year.disabled_sources.is_empty() {
                        println!("   Disabled: {}", year.disabled_sources.join(", "));
                    }
                    if !year.source_errors.is_empty() {
                        println!("\n⚠️  Source errors:");
                        for err in &year.source_errors {
                            println!("   - {}", err);
                        }
                    }
                }
            }
            println!(
                "\n✅ Done: {} created, {} updated",
                total.created, total.updated
            );
        }
    }

    Ok(())
}
