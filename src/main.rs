//! idea-impact: command line entry point

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use idea_impact::services::analytics::{BalanceStore, SqliteBalanceStore, UsageLedgerService};
use idea_impact::storage::open_pool;
use idea_impact::utils::paths;
use idea_impact::{AnalysisService, AppConfig, ConfigService};
use idea_impact_pipeline::Proposal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idea-impact")]
#[command(about = "Sustainability impact analysis for submitted ideas")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "IDEA_IMPACT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a proposal and print the resulting state as JSON
    Analyze {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        title: Option<String>,
        /// Proposal text
        text: String,
    },
    /// Print the impact score for a vote count
    Score { upvotes: u32, downvotes: u32 },
    /// Inspect or top up a user's balance
    Balance {
        #[command(subcommand)]
        action: BalanceAction,
    },
    /// Print a user's usage summary
    Usage {
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum BalanceAction {
    Show {
        #[arg(short, long)]
        user: String,
    },
    Credit {
        #[arg(short, long)]
        user: String,
        /// Amount in microdollars
        #[arg(short, long)]
        amount: i64,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn database_path(config: &AppConfig) -> anyhow::Result<PathBuf> {
    Ok(match &config.billing.database_path {
        Some(path) => path.clone(),
        None => paths::database_path()?,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_service = match &cli.config {
        Some(path) => ConfigService::load(path.clone()),
        None => ConfigService::new(),
    }
    .context("failed to load configuration")?;
    let config = config_service.get_config().clone();
    init_tracing(&config);
    info!(config = %config_service.path().display(), "configuration loaded");

    match cli.command {
        Command::Analyze { user, title, text } => {
            let service = AnalysisService::from_config(&config)?;
            let mut proposal = Proposal::new(text);
            if let Some(title) = title {
                proposal = proposal.with_title(title);
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling analysis");
                    on_interrupt.cancel();
                }
            });

            let outcome = service.analyze_with_cancel(&user, proposal, cancel).await?;
            print_json(&outcome)?;
        }
        Command::Score { upvotes, downvotes } => {
            print_json(&idea_impact_core::score(upvotes, downvotes))?;
        }
        Command::Balance { action } => {
            let balances = SqliteBalanceStore::from_pool(open_pool(&database_path(&config)?)?)?;
            let (user, balance) = match action {
                BalanceAction::Show { user } => {
                    let balance = balances.get_balance(&user)?;
                    (user, balance)
                }
                BalanceAction::Credit { user, amount } => {
                    anyhow::ensure!(amount > 0, "credit amount must be positive");
                    let balance = balances.credit(&user, amount)?;
                    (user, balance)
                }
            };
            print_json(&serde_json::json!({ "userId": user, "balanceMicrodollars": balance }))?;
        }
        Command::Usage { user } => {
            let ledger = UsageLedgerService::from_pool(open_pool(&database_path(&config)?)?)?;
            print_json(&ledger.usage_summary(&user)?)?;
        }
    }

    Ok(())
}
