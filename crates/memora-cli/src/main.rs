//! Memora CLI
//!
//! Command-line access to a Memora decision database

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use memora_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "memora")]
#[command(about = "Memora - decision memory for engineering teams", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = ".memora/memora.db")]
    db: PathBuf,

    /// Engine configuration (TOML); `MEMORA__*` variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database or bring its schema up to date
    Migrate,
    /// List current decisions, most recently updated first
    List(commands::decisions::ListArgs),
    /// Show one decision with its links and open tasks
    Show(commands::decisions::ShowArgs),
    /// Aggregate counts and average confidence
    Stats(commands::decisions::StatsArgs),
    /// Render a decision as a Markdown ADR
    Export(commands::decisions::ExportArgs),
    /// List validation tasks
    Tasks(commands::review::TasksArgs),
    /// Submit a reviewer verdict for a task
    Feedback(commands::review::FeedbackArgs),
    /// Escalate overdue tasks and archive expired decisions
    Sweep,
    /// Publish new factor weights from the validation history
    Recalibrate,
    /// Check every graph and workflow invariant
    Verify,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    init(Profile::Cli);

    let cli = Cli::parse();
    let global = commands::GlobalArgs {
        db: cli.db,
        config: cli.config,
    };

    match cli.command {
        Commands::Migrate => commands::migrate::execute(&global),
        Commands::List(args) => commands::decisions::list(&global, args).await,
        Commands::Show(args) => commands::decisions::show(&global, args).await,
        Commands::Stats(args) => commands::decisions::stats(&global, args).await,
        Commands::Export(args) => commands::decisions::export(&global, args).await,
        Commands::Tasks(args) => commands::review::tasks(&global, args).await,
        Commands::Feedback(args) => commands::review::feedback(&global, args).await,
        Commands::Sweep => commands::maintenance::sweep(&global).await,
        Commands::Recalibrate => commands::maintenance::recalibrate(&global).await,
        Commands::Verify => commands::maintenance::verify(&global).await,
    }
}
