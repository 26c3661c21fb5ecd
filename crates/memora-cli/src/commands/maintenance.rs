//! Maintenance commands: sweep, recalibrate, verify

use chrono::Utc;

use memora_engine::commands::engine_command::{
    apply_engine_command, EngineCommand, EngineCommandResult,
};

use super::{open_engine, GlobalArgs};

pub async fn sweep(global: &GlobalArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let report = match apply_engine_command(&engine, EngineCommand::Sweep, Utc::now()).await? {
        EngineCommandResult::Swept(report) => report,
        other => anyhow::bail!("unexpected result {:?}", other),
    };

    println!(
        "✓ Escalated {} task(s), archived {} decision(s)",
        report.escalated.len(),
        report.archived.len()
    );
    for task in &report.escalated {
        println!(
            "  escalated {} -> {}",
            task.task_id,
            task.assigned_reviewer.as_deref().unwrap_or("-")
        );
    }
    for id in &report.archived {
        println!("  archived {}", id);
    }
    Ok(())
}

pub async fn recalibrate(global: &GlobalArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let event = match apply_engine_command(&engine, EngineCommand::Recalibrate, Utc::now()).await?
    {
        EngineCommandResult::Recalibrated(event) => event,
        other => anyhow::bail!("unexpected result {:?}", other),
    };

    println!(
        "✓ Weights v{} -> v{} from {} samples (error {:.4} -> {:.4})",
        event.from_version, event.to_version, event.sample_count, event.error_before, event.error_after
    );
    Ok(())
}

/// Exits non-zero when any invariant is broken
pub async fn verify(global: &GlobalArgs) -> anyhow::Result<()> {
    let engine = open_engine(global).await?;
    let violations = engine.verify()?;

    if violations.is_empty() {
        println!("✓ No invariant violations");
        return Ok(());
    }
    for v in &violations {
        println!("✗ {}", v);
    }
    anyhow::bail!("{} invariant violation(s)", violations.len())
}
