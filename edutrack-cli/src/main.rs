use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod paths;
mod store;

#[derive(Parser)]
#[command(name = "edutrack", about = "Learner progress analytics and reward scoring")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage subject catalogs
    Catalog(commands::catalog::CatalogArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Enroll a learner in a subject
    Enroll(commands::enroll::EnrollArgs),
    /// Show a learner's cumulative rewards
    Ledger(commands::ledger::LedgerArgs),
    /// Show a learner's progress dashboard
    Progress(commands::progress::ProgressArgs),
    /// Preview the reward for an attempt without saving anything
    Score(commands::score::ScoreArgs),
    /// Score and save a completed assessment
    Submit(commands::submit::SubmitArgs),
    /// Record a video watch session
    Watch(commands::watch::WatchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Catalog(args) => commands::catalog::run(args).await,
        Commands::Config(args) => commands::config::run(args),
        Commands::Enroll(args) => commands::enroll::run(args).await,
        Commands::Ledger(args) => commands::ledger::run(args).await,
        Commands::Progress(args) => commands::progress::run(args).await,
        Commands::Score(args) => commands::score::run(args),
        Commands::Submit(args) => commands::submit::run(args).await,
        Commands::Watch(args) => commands::watch::run(args).await,
    }
}
