//! Schema migration command
//!
//! Usage: memora migrate [--db <FILE>]

use anyhow::Context;

use memora_store::migrations::applied_migrations;
use memora_store::SqliteSink;

use super::GlobalArgs;

pub fn execute(global: &GlobalArgs) -> anyhow::Result<()> {
    let sink = SqliteSink::open(&global.db)
        .with_context(|| format!("failed to migrate {}", global.db.display()))?;
    let applied = sink.with_connection(applied_migrations)?;

    println!("✓ {} is at schema {}", global.db.display(), applied.len());
    for (id, _checksum) in &applied {
        println!("  {}", id);
    }
    Ok(())
}
