// src/config.rs

//! Runtime settings assembled from command-line flags and the environment

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Default module search path
pub const DEFAULT_MODULEPATH: &str = "/etc/modtool/modules";

/// Default module repository
pub const DEFAULT_REPOSITORY: &str = "https://forgeapi.puppet.com";

/// Default location of the archive and release metadata caches
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/modtool";

/// Default release metadata freshness in seconds (1 hour)
pub const DEFAULT_METADATA_EXPIRE_SECS: i64 = 60 * 60;

/// Release metadata database file, relative to the cache directory
const RELEASE_DB_FILE: &str = "releases.db";

/// Downloaded archives, relative to the cache directory
const ARCHIVE_DIR: &str = "archives";

/// Validated settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Module search path, earliest entry wins
    pub modulepath: Vec<PathBuf>,
    /// Where newly installed dependencies go
    pub target_dir: PathBuf,
    pub repository: String,
    pub cache_dir: PathBuf,
    /// Seconds a module's cached releases stay fresh
    pub metadata_expire: i64,
}

impl Settings {
    /// Build settings, defaulting the target directory to the first
    /// modulepath entry
    pub fn new(
        modulepath: Vec<PathBuf>,
        target_dir: Option<PathBuf>,
        repository: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        metadata_expire: i64,
    ) -> Result<Self> {
        let repository = repository.into().trim().trim_end_matches('/').to_string();
        if repository.is_empty() {
            return Err(Error::Config("module repository URL must not be empty".to_string()));
        }

        let Some(first) = modulepath.first() else {
            return Err(Error::Config("modulepath must name at least one directory".to_string()));
        };
        let target_dir = target_dir.unwrap_or_else(|| first.clone());

        Ok(Self {
            modulepath,
            target_dir,
            repository,
            cache_dir: cache_dir.into(),
            metadata_expire,
        })
    }

    /// Split a platform path list (`a:b` on Unix) into modulepath entries
    pub fn parse_modulepath(value: &str) -> Vec<PathBuf> {
        std::env::split_paths(value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect()
    }

    pub fn release_db(&self) -> PathBuf {
        self.cache_dir.join(RELEASE_DB_FILE)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.cache_dir.join(ARCHIVE_DIR)
    }

    pub fn is_on_modulepath(&self, dir: &Path) -> bool {
        self.modulepath.iter().any(|p| p == dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_dir_defaults_to_first_modulepath_entry() {
        let settings = Settings::new(
            Settings::parse_modulepath("/etc/modules:/usr/share/modules"),
            None,
            "https://forge.test/",
            "/tmp/cache",
            DEFAULT_METADATA_EXPIRE_SECS,
        )
        .unwrap();

        assert_eq!(settings.modulepath.len(), 2);
        assert_eq!(settings.target_dir, PathBuf::from("/etc/modules"));
        assert_eq!(settings.repository, "https://forge.test");
        assert_eq!(settings.release_db(), PathBuf::from("/tmp/cache/releases.db"));
        assert_eq!(settings.archive_dir(), PathBuf::from("/tmp/cache/archives"));
        assert!(settings.is_on_modulepath(Path::new("/usr/share/modules")));
    }

    #[test]
    fn test_explicit_target_dir() {
        let settings = Settings::new(
            vec![PathBuf::from("/etc/modules")],
            Some(PathBuf::from("/srv/modules")),
            DEFAULT_REPOSITORY,
            DEFAULT_CACHE_DIR,
            0,
        )
        .unwrap();
        assert_eq!(settings.target_dir, PathBuf::from("/srv/modules"));
        assert!(!settings.is_on_modulepath(&settings.target_dir));
    }

    #[test]
    fn test_rejects_empty_values() {
        let empty_path = Settings::new(Vec::new(), None, DEFAULT_REPOSITORY, DEFAULT_CACHE_DIR, 0);
        assert!(matches!(empty_path, Err(Error::Config(_))));

        let empty_repo = Settings::new(
            Settings::parse_modulepath("/etc/modules"),
            None,
            "  ",
            DEFAULT_CACHE_DIR,
            0,
        );
        assert!(matches!(empty_repo, Err(Error::Config(_))));
        assert!(Settings::parse_modulepath("").is_empty());
    }
}
