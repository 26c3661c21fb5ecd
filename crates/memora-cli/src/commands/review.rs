//! Review workflow commands
//!
//! Usage:
//!   memora tasks [--reviewer <ID>] [--all] [--json]
//!   memora feedback <TASK_ID> <approve|reject> --reviewer <ID> [--reason <TEXT>]

use anyhow::Context;
use chrono::Utc;
use clap::{Args, ValueEnum};

use memora_core::model::{ReviewerFeedback, Verdict};
use memora_core::queries::TaskFilters;
use memora_engine::commands::engine_command::{
    apply_engine_command, EngineCommand, EngineCommandResult,
};

use super::{open_engine, print_json, GlobalArgs};

#[derive(Debug, Args)]
pub struct TasksArgs {
    /// Only tasks assigned to this reviewer
    #[arg(long)]
    pub reviewer: Option<String>,

    /// Include resolved tasks
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VerdictArg {
    Approve,
    Reject,
}

impl From<VerdictArg> for Verdict {
    fn from(v: VerdictArg) -> Self {
        match v {
            VerdictArg::Approve => Verdict::Approve,
            VerdictArg::Reject => Verdict::Reject,
        }
    }
}

#[derive(Debug, Args)]
pub struct FeedbackArgs {
    pub task_id: String,

    #[arg(value_enum)]
    pub verdict: VerdictArg,

    #[arg(long)]
    pub reviewer: String,

    #[arg(long)]
    pub reason: Option<String>,

    /// Decision version that was reviewed (default: the task's version)
    #[arg(long)]
    pub decision_version: Option<u32>,
}

pub async fn tasks(global: &GlobalArgs, args: TasksArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let tasks = engine.tasks(&TaskFilters {
        reviewer: args.reviewer,
        status: None,
        include_resolved: args.all,
    })?;

    if args.json {
        return print_json(&tasks);
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for t in &tasks {
        println!(
            "{}  {:<10} {:?}  {}@v{}  {}  due {}",
            t.task_id,
            t.status,
            t.priority,
            t.decision_id,
            t.version,
            t.assigned_reviewer.as_deref().unwrap_or("-"),
            t.due_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn feedback(global: &GlobalArgs, args: FeedbackArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let version = match args.decision_version {
        Some(v) => v,
        None => {
            engine
                .snapshot()?
                .task(&args.task_id)
                .with_context(|| format!("unknown task {}", args.task_id))?
                .version
        }
    };

    let cmd = EngineCommand::SubmitFeedback(ReviewerFeedback {
        task_id: args.task_id,
        reviewer: args.reviewer,
        version,
        verdict: args.verdict.into(),
        reason: args.reason,
    });
    match apply_engine_command(&engine, cmd, Utc::now()).await? {
        EngineCommandResult::Feedback(outcome) => {
            println!(
                "✓ {} is now {} (v{})",
                outcome.decision_id, outcome.status, outcome.version
            );
            if let Some(next) = outcome.next_task {
                println!(
                    "  re-review {} assigned to {}",
                    next.task_id,
                    next.assigned_reviewer.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        other => anyhow::bail!("unexpected result {:?}", other),
    }
}
