//! SQLite-backed `StoreSink`
//!
//! One SQLite transaction per committed `ChangeSet`. A decision version
//! whose `expected_head` no longer matches the stored head aborts the whole
//! transaction with `VersionConflict`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use memora_core::errors::{ExError, ExErrorKind};
use memora_core::model::WeightsConfig;
use memora_core::ops::{ChangeSet, Store};
use memora_core::StoreSink;
use rusqlite::Connection;

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use crate::repo::{hydration, SqliteRepo};

pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = db::open(path)?;
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh in-memory database with the schema applied
    pub fn in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(from_rusqlite)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read against the underlying connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            ExError::new(ExErrorKind::Concurrency).with_message("sqlite connection lock poisoned")
        })
    }
}

impl StoreSink for SqliteSink {
    fn load(&self, default_weights: &WeightsConfig) -> std::result::Result<Store, ExError> {
        let conn = self.lock()?;
        hydration::load_store(&conn, default_weights)
    }

    fn commit(&self, changes: &ChangeSet) -> std::result::Result<(), ExError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(from_rusqlite)?;
        for change in changes.iter() {
            // dropping `tx` on error rolls back everything written so far
            SqliteRepo::apply_change(&tx, change)?;
        }
        tx.commit().map_err(from_rusqlite)?;
        tracing::debug!(changes = changes.len(), "change set committed");
        Ok(())
    }
}
