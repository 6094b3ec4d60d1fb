// src/repository/cache.rs

//! Release metadata cache
//!
//! Wraps any `RemoteRegistry` and remembers its answers in the SQLite
//! release cache. A module's cached releases are served until they are
//! older than `metadata_expire` seconds.

use super::{RemoteRegistry, RemoteRelease, current_timestamp, parse_timestamp};
use crate::db::{self, models::CachedRelease, models::ModuleSync};
use crate::error::{Error, Result};
use crate::inventory::metadata::normalize_name;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Registry decorator backed by the release cache database
pub struct CachedRegistry<R: RemoteRegistry> {
    inner: R,
    conn: Mutex<Connection>,
    metadata_expire: i64,
}

impl<R: RemoteRegistry> CachedRegistry<R> {
    /// Open (or create) the cache database at `db_path` in front of `inner`
    pub fn new(inner: R, db_path: &Path, metadata_expire: i64) -> Result<Self> {
        let conn = db::open_or_init(db_path)?;
        Ok(Self {
            inner,
            conn: Mutex::new(conn),
            metadata_expire,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::InitError(format!("Release cache lock poisoned: {}", e)))
    }

    fn is_fresh(&self, conn: &Connection, module_name: &str) -> Result<bool> {
        let Some(sync) = ModuleSync::find(conn, module_name, self.inner.uri())? else {
            return Ok(false);
        };

        let synced_at = match parse_timestamp(&sync.synced_at) {
            Ok(ts) => ts,
            Err(e) => {
                warn!("Ignoring cache entry for '{}': {}", module_name, e);
                return Ok(false);
            }
        };

        let age = chrono::Utc::now().timestamp() - synced_at;
        Ok(age <= self.metadata_expire)
    }

    fn load(&self, conn: &Connection, module_name: &str) -> Result<Vec<RemoteRelease>> {
        CachedRelease::find_by_module(conn, module_name, self.inner.uri())?
            .into_iter()
            .map(|cached| -> Result<RemoteRelease> {
                Ok(RemoteRelease {
                    version: cached.version,
                    file_uri: cached.file_uri,
                    dependencies: serde_json::from_str(&cached.dependencies)?,
                })
            })
            .collect()
    }

    fn store(&self, conn: &mut Connection, module_name: &str, releases: &[RemoteRelease]) -> Result<()> {
        let repository = self.inner.uri().to_string();
        db::transaction(conn, |tx| {
            CachedRelease::delete_by_module(tx, module_name, &repository)?;
            for release in releases {
                let mut cached = CachedRelease::new(
                    module_name.to_string(),
                    repository.clone(),
                    release.version.clone(),
                );
                cached.file_uri = release.file_uri.clone();
                cached.dependencies = serde_json::to_string(&release.dependencies)?;
                cached.insert(tx)?;
            }

            let mut sync = ModuleSync::new(module_name.to_string(), repository.clone(), current_timestamp());
            sync.upsert(tx)?;
            Ok(())
        })
    }
}

impl<R: RemoteRegistry> RemoteRegistry for CachedRegistry<R> {
    fn uri(&self) -> &str {
        self.inner.uri()
    }

    fn releases(&self, module_name: &str) -> Result<Vec<RemoteRelease>> {
        let key = normalize_name(module_name);
        let mut conn = self.lock()?;

        if self.is_fresh(&conn, &key)? {
            debug!("Using cached releases for '{}'", key);
            return self.load(&conn, &key);
        }

        let mut seen = HashSet::new();
        let mut releases = self.inner.releases(module_name)?;
        releases.retain(|release| seen.insert(release.version.clone()));

        if let Err(e) = self.store(&mut conn, &key, &releases) {
            warn!("Failed to cache releases of '{}': {}", key, e);
        }
        Ok(releases)
    }
}
