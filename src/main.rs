mod cli;

use clap::Parser;
use cli::{Cli, Commands, LedgerCommand};
use fleetreport::app::App;
use fleetreport::config::Config;
use fleetreport::ledger::DayKey;
use fleetreport::observability;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run(args) => {
            let app = App::open(config)?;
            let day = args.date.unwrap_or_else(DayKey::today);
            let summary = app.coordinator()?.run(day).await?;
            if summary.is_noop() {
                info!(day_key = %summary.day_key, "Nothing left to process today");
            } else {
                info!(
                    day_key = %summary.day_key,
                    batch = summary.batch.len(),
                    succeeded = summary.succeeded.len(),
                    failed = summary.failed.len(),
                    deferred = summary.deferred,
                    rows_appended = summary.metrics.rows_appended,
                    rows_purged = summary.metrics.rows_purged,
                    "Run summary"
                );
            }
        }
        Commands::Ledger { command } => {
            let app = App::open(config)?;
            let mut ledger = app.ledger().await?;
            match command {
                LedgerCommand::Show => {
                    for entry in ledger.entries().await? {
                        println!("{}\t{}", entry.key, entry.value);
                    }
                }
                LedgerCommand::Clear => {
                    let removed = ledger.len();
                    ledger.clear().await?;
                    info!(removed, "Ledger cleared");
                }
            }
        }
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}
