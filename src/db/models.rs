// src/db/models.rs

//! Data models for the release cache tables

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Records when a module's releases were last fetched from a repository
#[derive(Debug, Clone)]
pub struct ModuleSync {
    pub id: Option<i64>,
    pub module_name: String,
    pub repository: String,
    /// RFC 3339 timestamp
    pub synced_at: String,
}

impl ModuleSync {
    pub fn new(module_name: String, repository: String, synced_at: String) -> Self {
        Self {
            id: None,
            module_name,
            repository,
            synced_at,
        }
    }

    /// Insert or refresh the sync record for this module and repository
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO module_syncs (module_name, repository, synced_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(module_name, repository) DO UPDATE SET synced_at = excluded.synced_at",
            params![&self.module_name, &self.repository, &self.synced_at],
        )?;

        let id = conn.query_row(
            "SELECT id FROM module_syncs WHERE module_name = ?1 AND repository = ?2",
            params![&self.module_name, &self.repository],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    /// Find the sync record for a module in a repository
    pub fn find(conn: &Connection, module_name: &str, repository: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, module_name, repository, synced_at
             FROM module_syncs WHERE module_name = ?1 AND repository = ?2",
        )?;

        let sync = stmt
            .query_row(params![module_name, repository], Self::from_row)
            .optional()?;

        Ok(sync)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            module_name: row.get(1)?,
            repository: row.get(2)?,
            synced_at: row.get(3)?,
        })
    }
}

/// A release as stored in the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRelease {
    pub id: Option<i64>,
    pub module_name: String,
    pub repository: String,
    pub version: String,
    pub file_uri: Option<String>,
    /// JSON array of `{name, version_requirement}` objects
    pub dependencies: String,
}

impl CachedRelease {
    pub fn new(module_name: String, repository: String, version: String) -> Self {
        Self {
            id: None,
            module_name,
            repository,
            version,
            file_uri: None,
            dependencies: "[]".to_string(),
        }
    }

    /// Insert the release; a row already cached for the same version is
    /// overwritten in place
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO cached_releases (module_name, repository, version, file_uri, dependencies)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(module_name, repository, version)
             DO UPDATE SET file_uri = excluded.file_uri, dependencies = excluded.dependencies",
            params![
                &self.module_name,
                &self.repository,
                &self.version,
                &self.file_uri,
                &self.dependencies,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM cached_releases WHERE module_name = ?1 AND repository = ?2 AND version = ?3",
            params![&self.module_name, &self.repository, &self.version],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    /// Find all cached releases of a module, in insertion order
    pub fn find_by_module(conn: &Connection, module_name: &str, repository: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, module_name, repository, version, file_uri, dependencies
             FROM cached_releases WHERE module_name = ?1 AND repository = ?2 ORDER BY id",
        )?;

        let releases = stmt
            .query_map(params![module_name, repository], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(releases)
    }

    /// Delete the cached releases of a module (used when refreshing)
    pub fn delete_by_module(conn: &Connection, module_name: &str, repository: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM cached_releases WHERE module_name = ?1 AND repository = ?2",
            params![module_name, repository],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            module_name: row.get(1)?,
            repository: row.get(2)?,
            version: row.get(3)?,
            file_uri: row.get(4)?,
            dependencies: row.get(5)?,
        })
    }
}
