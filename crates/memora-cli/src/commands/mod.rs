pub mod decisions;
pub mod maintenance;
pub mod migrate;
pub mod review;

use anyhow::Context;
use std::path::PathBuf;

use memora_core::EngineConfig;
use memora_engine::Engine;

/// Flags shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub db: PathBuf,
    pub config: Option<PathBuf>,
}

/// Load configuration and open the engine over the database
pub async fn open_engine(global: &GlobalArgs) -> anyhow::Result<Engine> {
    let config = EngineConfig::load(global.config.as_deref())
        .context("failed to load configuration")?;
    let engine = Engine::builder(config)
        .sqlite(&global.db)
        .with_context(|| format!("failed to open {}", global.db.display()))?
        .build()
        .await?;
    Ok(engine)
}

/// Pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
