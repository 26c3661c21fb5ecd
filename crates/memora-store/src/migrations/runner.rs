//! Migration runner
//!
//! Applies migrations with checksums, gap detection, and idempotency

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::get_migrations;
use rusqlite::Connection;

/// Apply all pending migrations to the database
///
/// Already-applied migrations are verified against their recorded checksum.
/// A database that knows a migration this binary does not (written by a
/// newer build) is rejected rather than touched.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    create_schema_version_table(conn)?;

    let migrations = get_migrations();
    let applied = applied_migrations(conn)?;

    for (id, _) in &applied {
        if !migrations.iter().any(|m| m.id == id.as_str()) {
            return Err(migration_error(id, "unknown migration recorded in database"));
        }
    }

    for (position, migration) in migrations.iter().enumerate() {
        match applied.get(position) {
            Some((id, checksum)) if id == migration.id => {
                let expected = compute_checksum(migration.sql);
                if checksum.as_deref().is_some_and(|c| c != expected) {
                    return Err(checksum_mismatch(
                        migration.id,
                        &expected,
                        checksum.as_deref().unwrap_or_default(),
                    ));
                }
            }
            Some((id, _)) => {
                return Err(migration_error(
                    migration.id,
                    &format!("gap in applied migrations: found {} at its position", id),
                ));
            }
            None => apply_migration(conn, migration.id, migration.sql)?,
        }
    }

    Ok(())
}

/// `(migration_id, checksum)` in application order
pub fn applied_migrations(conn: &Connection) -> Result<Vec<(String, Option<String>)>> {
    create_schema_version_table(conn)?;
    let mut stmt = conn
        .prepare("SELECT migration_id, checksum FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Create the schema_version table if it doesn't exist
fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Apply a single migration in its own transaction
fn apply_migration(conn: &mut Connection, migration_id: &str, sql: &str) -> Result<()> {
    let checksum = compute_checksum(sql);

    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(sql)
        .map_err(|e| migration_error(migration_id, &e.to_string()))?;

    let now = chrono::Utc::now().timestamp();
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
        rusqlite::params![migration_id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(migration_id, "migration applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memora_core::ExErrorKind;

    #[test]
    fn test_apply_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(applied_migrations(&conn).unwrap().len(), get_migrations().len());
    }

    #[test]
    fn test_idempotency() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(applied_migrations(&conn).unwrap().len(), get_migrations().len());
    }

    #[test]
    fn test_edited_migration_is_detected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "UPDATE schema_version SET checksum = 'deadbeef' WHERE migration_id = '001_initial_schema'",
            [],
        )
        .unwrap();
        let err = apply_migrations(&mut conn).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Migration);
    }

    #[test]
    fn test_unknown_migration_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES ('999_future', 0, NULL)",
            [],
        )
        .unwrap();
        assert!(apply_migrations(&mut conn).is_err());
    }
}
