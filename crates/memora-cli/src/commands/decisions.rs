//! Read-only decision commands
//!
//! Usage:
//!   memora list [--scope <SCOPE>] [--status <STATUS>] [--limit <N>] [--json]
//!   memora show <DECISION_ID>
//!   memora stats [--scope <SCOPE>]
//!   memora export <DECISION_ID> [--output <FILE>]

use clap::Args;
use std::path::PathBuf;

use memora_core::model::{DecisionStatus, Platform, Scope};
use memora_core::queries::{DecisionFilters, PaginationParams};

use super::{open_engine, print_json, GlobalArgs};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// `repository:<name>` or `workspace:<id>`
    #[arg(long)]
    pub scope: Option<Scope>,

    #[arg(long)]
    pub status: Option<DecisionStatus>,

    #[arg(long)]
    pub platform: Option<Platform>,

    #[arg(long)]
    pub tag: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Cursor printed by a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub decision_id: String,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[arg(long)]
    pub scope: Option<Scope>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub decision_id: String,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn list(global: &GlobalArgs, args: ListArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let filters = DecisionFilters {
        scope: args.scope,
        status: args.status,
        platform: args.platform,
        tag: args.tag,
    };
    let page = engine.list(
        &filters,
        &PaginationParams {
            cursor: args.cursor,
            limit: args.limit,
        },
    )?;

    if args.json {
        return print_json(&page);
    }
    if page.items.is_empty() {
        println!("No decisions.");
        return Ok(());
    }
    for d in &page.items {
        println!(
            "{}  {:<18} {:.2}  v{}  {}",
            d.decision_id, d.status, d.confidence.overall, d.version, d.title
        );
    }
    if let (true, Some(cursor)) = (page.has_more, &page.cursor) {
        println!("next page: --cursor {}", cursor);
    }
    Ok(())
}

pub async fn show(global: &GlobalArgs, args: ShowArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let detail = engine.detail(&args.decision_id)?;
    print_json(&detail)
}

pub async fn stats(global: &GlobalArgs, args: StatsArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let stats = engine.stats(args.scope.as_ref())?;
    print_json(&stats)
}

pub async fn export(global: &GlobalArgs, args: ExportArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let markdown = engine.render_adr(&args.decision_id)?;

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, markdown)?;
        println!("✓ Exported to {}", output_path.display());
    } else {
        print!("{}", markdown);
    }
    Ok(())
}
