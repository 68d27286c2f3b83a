//! Brings a meta database up to the schema this build expects.
//!
//! Applied versions are recorded in `mt_meta.applied_migrations`. Each
//! pending migration runs in its own transaction together with its version
//! row, so a failed step leaves the store at the previous version.

use crate::ddl::{Migration, MIGRATIONS};
use crate::error::{MetaError, MetaResult};
use duckdb::Connection;

const BOOKKEEPING: &str = "CREATE SCHEMA IF NOT EXISTS mt_meta;
     CREATE TABLE IF NOT EXISTS mt_meta.applied_migrations (
         version    INTEGER PRIMARY KEY,
         applied_at TIMESTAMP NOT NULL DEFAULT now()
     );";

/// Highest applied migration, 0 for a fresh database
pub fn applied_version(conn: &Connection) -> MetaResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM mt_meta.applied_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| MetaError::MigrationError(format!("cannot read applied version: {e}")))
}

/// Apply every pending migration; returns how many ran
pub fn run_migrations(conn: &Connection) -> MetaResult<usize> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> MetaResult<usize> {
    conn.execute_batch(BOOKKEEPING)
        .map_err(|e| MetaError::MigrationError(format!("cannot create bookkeeping: {e}")))?;

    let applied = applied_version(conn)?;
    let latest = migrations.last().map_or(0, |m| m.version);
    if applied > latest {
        return Err(MetaError::MigrationError(format!(
            "database is at schema v{applied:03}, newer than the supported v{latest:03}"
        )));
    }

    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > applied).collect();
    for migration in &pending {
        log::debug!("Applying meta migration v{:03}", migration.version);
        step(conn, migration).map_err(|e| {
            let _ = conn.execute_batch("ROLLBACK");
            MetaError::MigrationError(format!("v{:03}: {e}", migration.version))
        })?;
    }
    if !pending.is_empty() {
        log::info!(
            "Meta database migrated from v{:03} to v{:03}",
            applied,
            latest
        );
    }
    Ok(pending.len())
}

fn step(conn: &Connection, migration: &Migration) -> duckdb::Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    conn.execute_batch(migration.sql)?;
    conn.execute(
        "INSERT INTO mt_meta.applied_migrations (version) VALUES (?)",
        duckdb::params![migration.version],
    )?;
    conn.execute_batch("COMMIT")
}
