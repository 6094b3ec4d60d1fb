// src/db/schema.rs

//! Release cache schema and its migrations
//!
//! Each migration runs in its own transaction together with the bump of
//! `schema_version`, so a failed migration leaves the previous version intact.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

type Migration = fn(&Connection) -> Result<()>;

/// Migrations in order; entry `n` upgrades the schema to version `n + 1`
const MIGRATIONS: &[Migration] = &[create_release_tables, add_release_dependencies];

/// Schema version a fully migrated database reports
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Read the schema version, creating the tracking table when absent
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Bring the database up to [`SCHEMA_VERSION`]
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;
    debug!("Release cache schema version: {}", current);

    if current > SCHEMA_VERSION {
        return Err(Error::InitError(format!(
            "Release cache schema version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }

    for (index, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = index as i32 + 1;
        info!("Migrating release cache to schema version {}", version);

        let tx = conn.unchecked_transaction()?;
        migration(&tx)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
    }

    Ok(())
}

/// Version 1: sync records and the releases each sync returned
fn create_release_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE module_syncs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module_name TEXT NOT NULL,
            repository TEXT NOT NULL,
            synced_at TEXT NOT NULL,
            UNIQUE(module_name, repository)
        );

        CREATE TABLE cached_releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module_name TEXT NOT NULL,
            repository TEXT NOT NULL,
            version TEXT NOT NULL,
            file_uri TEXT,
            UNIQUE(module_name, repository, version)
        );

        CREATE INDEX idx_cached_releases_module ON cached_releases(module_name, repository);
        ",
    )?;
    Ok(())
}

/// Version 2: release dependencies as a JSON array, so resolution can run
/// from the cache alone
fn add_release_dependencies(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "ALTER TABLE cached_releases ADD COLUMN dependencies TEXT NOT NULL DEFAULT '[]';",
    )?;
    Ok(())
}
