// src/inventory/metadata.rs

//! Module metadata (`metadata.json`) and module naming rules

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Metadata file shipped at the root of every packaged module
pub const METADATA_FILE: &str = "metadata.json";

/// Optional standalone checksum manifest (`relative path -> sha256`)
pub const CHECKSUMS_FILE: &str = "checksums.json";

/// Parsed `metadata.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Full module name (`author-name` or `author/name`)
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
    /// SHA-256 digests of the packaged files, keyed by relative path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checksums: BTreeMap<String, String>,
}

/// A dependency declared by a module on another module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub name: String,
    #[serde(default)]
    pub version_requirement: Option<String>,
}

impl ModuleDependency {
    pub fn new(name: impl Into<String>, version_requirement: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version_requirement: version_requirement.map(str::to_string),
        }
    }
}

/// Load metadata from a module directory
///
/// Returns `Ok(None)` when the directory has no `metadata.json`. Checksums
/// from a sibling `checksums.json` are used when the metadata carries none.
pub fn load(module_dir: &Path) -> Result<Option<ModuleMetadata>> {
    let metadata_path = module_dir.join(METADATA_FILE);
    if !metadata_path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&metadata_path)?;
    let mut metadata: ModuleMetadata = serde_json::from_str(&content).map_err(|e| {
        Error::Parse(format!("Invalid {}: {}", metadata_path.display(), e))
    })?;

    if metadata.checksums.is_empty() {
        let checksums_path = module_dir.join(CHECKSUMS_FILE);
        if checksums_path.is_file() {
            debug!("Reading checksums from {}", checksums_path.display());
            let content = fs::read_to_string(&checksums_path)?;
            metadata.checksums = serde_json::from_str(&content).map_err(|e| {
                Error::Parse(format!("Invalid {}: {}", checksums_path.display(), e))
            })?;
        }
    }

    Ok(Some(metadata))
}

/// Canonical form of a module name (`author/name` → `author-name`)
pub fn normalize_name(name: &str) -> String {
    name.trim().replacen('/', "-", 1)
}

/// Whether the name carries an author part
pub fn has_author(name: &str) -> bool {
    name.contains(['-', '/'])
}

/// Directory a module is installed under (`author-name` → `name`)
pub fn dir_name(name: &str) -> &str {
    match name.split_once(['-', '/']) {
        Some((_, short)) if !short.is_empty() => short,
        _ => name,
    }
}
