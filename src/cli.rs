use clap::{Parser, Subcommand};
use fleetreport::ledger::DayKey;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fleetreport")]
#[command(about = "Resumable per-account report collection", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $FLEETREPORT_CONFIG or config/fleetreport.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the next batch of unprocessed accounts
    Run(RunArgs),
    /// Inspect or reset the completion ledger
    Ledger {
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Day key to run under, as YYYYMMDD (default: today, UTC)
    #[arg(long)]
    pub date: Option<DayKey>,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// List every ledger entry
    Show,
    /// Delete every ledger entry
    Clear,
}
