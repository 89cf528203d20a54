use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use wealthsync::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for wealthsync::AppCommand {
    fn from(cmd: Commands) -> wealthsync::AppCommand {
        match cmd {
            Commands::Run => wealthsync::AppCommand::Run,
            Commands::Status => wealthsync::AppCommand::Status,
            Commands::Reconcile { item, value } => {
                wealthsync::AppCommand::Reconcile { item, value }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run one sync cycle against the configured providers
    Run,
    /// Display per-account sync status
    Status,
    /// Apply a feed value to a single valuation item
    Reconcile {
        /// Valuation item to reconcile
        #[arg(long)]
        item: i64,
        /// Newly observed feed value
        #[arg(long)]
        value: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => wealthsync::cli::setup::setup(),
        Some(cmd) => wealthsync::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
