// src/inventory/mod.rs

//! Local inventory of installed modules
//!
//! Modules live in directories under an ordered list of search paths (the
//! modulepath). Earlier entries take precedence, and the same module may be
//! installed in more than one of them. This module provides:
//! - The `LocalInventory` trait consumed by the upgrade workflow
//! - `ModulePathInventory`, which scans the modulepath on disk
//! - The version constraints other installed modules place on a module

pub mod changes;
pub mod metadata;

use crate::error::Result;
use crate::version;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use metadata::{ModuleDependency, ModuleMetadata};

/// One on-disk installation of a module
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledModule {
    /// Module name from metadata, or the directory name without metadata
    pub name: String,
    /// Declared version, if any
    pub version: Option<String>,
    /// Directory holding the module's files
    pub install_path: PathBuf,
    /// Modulepath entry containing `install_path`
    pub modulepath: PathBuf,
    /// Index of `modulepath` in the configured search path list
    pub precedence: usize,
    pub metadata: Option<ModuleMetadata>,
}

impl InstalledModule {
    /// Whether the module ships packaging metadata
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Name of the directory the module is installed in
    pub fn dir_name(&self) -> &str {
        self.install_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }

    /// Version in display form, or `None` when undeclared
    pub fn display_version(&self) -> Option<String> {
        self.version.as_deref().map(|v| version::normalize(Some(v)))
    }

    /// Dependencies declared in the module's metadata
    pub fn dependencies(&self) -> &[ModuleDependency] {
        self.metadata
            .as_ref()
            .map(|m| m.dependencies.as_slice())
            .unwrap_or_default()
    }
}

/// Who imposes a version constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum ConstraintSource {
    /// Another installed module's dependency declaration
    Module(String),
    /// The caller's own explicit request
    Request,
}

impl fmt::Display for ConstraintSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintSource::Module(name) => f.write_str(name),
            ConstraintSource::Request => f.write_str("you"),
        }
    }
}

/// A version requirement placed on a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub source: ConstraintSource,
    /// Requirement expression; `None` only for a request without a version
    pub requirement: Option<String>,
}

impl Constraint {
    pub fn from_module(source: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            source: ConstraintSource::Module(source.into()),
            requirement: Some(requirement.into()),
        }
    }

    /// Synthetic constraint standing for the caller's own request
    pub fn from_request(requirement: Option<&str>) -> Self {
        Self {
            source: ConstraintSource::Request,
            requirement: requirement.map(str::to_string),
        }
    }
}

/// Installations of a module plus the constraints its dependents impose
#[derive(Debug, Clone, Default)]
pub struct InventoryMatch {
    /// Ordered by ascending search path precedence
    pub installed: Vec<InstalledModule>,
    pub conditions: Vec<Constraint>,
}

/// Read-only view of the locally installed modules
pub trait LocalInventory {
    /// Find every installation of `module_name` and the constraints on it
    fn find(&self, module_name: &str) -> Result<InventoryMatch>;

    /// Check whether an installed module differs from its packaged state
    fn has_local_changes(&self, module: &InstalledModule) -> Result<bool>;
}

/// Inventory backed by directories on the modulepath
#[derive(Debug, Clone)]
pub struct ModulePathInventory {
    modulepath: Vec<PathBuf>,
}

impl ModulePathInventory {
    pub fn new(modulepath: Vec<PathBuf>) -> Self {
        Self { modulepath }
    }

    pub fn modulepath(&self) -> &[PathBuf] {
        &self.modulepath
    }

    /// List every installed module, ordered by search path then directory name
    pub fn list(&self) -> Result<Vec<InstalledModule>> {
        let mut modules = Vec::new();

        for (precedence, dir) in self.modulepath.iter().enumerate() {
            if !dir.is_dir() {
                debug!("Skipping missing modulepath entry: {}", dir.display());
                continue;
            }

            let mut entries = fs::read_dir(dir)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            entries.sort_by_key(|e| e.file_name());

            for entry in entries {
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden || !path.is_dir() {
                    continue;
                }
                modules.push(Self::load_module(&path, dir, precedence));
            }
        }

        Ok(modules)
    }

    /// Unreadable metadata is logged and the module treated as metadata-less;
    /// `find` reports it only when the module is the one asked for
    fn load_module(path: &Path, modulepath: &Path, precedence: usize) -> InstalledModule {
        let metadata = metadata::load(path).unwrap_or_else(|e| {
            warn!("Ignoring metadata of {}: {}", path.display(), e);
            None
        });
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let (name, version) = match &metadata {
            Some(m) => (m.name.clone(), m.version.clone()),
            None => (dir_name, None),
        };

        InstalledModule {
            name,
            version,
            install_path: path.to_path_buf(),
            modulepath: modulepath.to_path_buf(),
            precedence,
            metadata,
        }
    }

    /// Whether an installed module is an installation of `wanted`
    fn is_installation_of(module: &InstalledModule, wanted: &str) -> bool {
        match &module.metadata {
            Some(meta) => {
                metadata::normalize_name(&meta.name) == metadata::normalize_name(wanted)
                    || (!metadata::has_author(wanted) && module.dir_name() == wanted)
            }
            None => {
                module.dir_name() == wanted || module.dir_name() == metadata::dir_name(wanted)
            }
        }
    }
}

impl LocalInventory for ModulePathInventory {
    fn find(&self, module_name: &str) -> Result<InventoryMatch> {
        let wanted = metadata::normalize_name(module_name);
        let (mut installed, others): (Vec<_>, Vec<_>) = self
            .list()?
            .into_iter()
            .partition(|m| Self::is_installation_of(m, module_name));
        installed.sort_by_key(|m| m.precedence);

        for module in installed.iter().filter(|m| !m.has_metadata()) {
            metadata::load(&module.install_path)?;
        }

        let conditions = others
            .iter()
            .flat_map(|m| {
                m.dependencies()
                    .iter()
                    .filter(|dep| metadata::normalize_name(&dep.name) == wanted)
                    .map(|dep| {
                        Constraint::from_module(
                            m.name.clone(),
                            dep.version_requirement.as_deref().unwrap_or(">= 0.0.0"),
                        )
                    })
            })
            .collect::<Vec<_>>();

        debug!(
            "Found {} installation(s) of '{}' with {} condition(s)",
            installed.len(),
            module_name,
            conditions.len()
        );

        Ok(InventoryMatch {
            installed,
            conditions,
        })
    }

    fn has_local_changes(&self, module: &InstalledModule) -> Result<bool> {
        let Some(meta) = &module.metadata else {
            debug!("'{}' has no metadata; local changes cannot be checked", module.name);
            return Ok(false);
        };

        if meta.checksums.is_empty() {
            warn!(
                "'{}' records no checksums; unable to detect local changes",
                module.name
            );
            return Ok(false);
        }

        let modified = changes::modified_files(&module.install_path, &meta.checksums)?;
        for file in &modified {
            debug!("Locally modified: {}", module.install_path.join(file).display());
        }
        Ok(!modified.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_module(root: &Path, dir: &str, metadata: Option<&str>) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        if let Some(content) = metadata {
            fs::write(path.join(metadata::METADATA_FILE), content).unwrap();
        }
        path
    }

    #[test]
    fn test_find_single_installation() {
        let root = TempDir::new().unwrap();
        write_module(
            root.path(),
            "ntp",
            Some(r#"{"name": "acme-ntp", "version": "1.0.0"}"#),
        );

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let found = inventory.find("acme-ntp").unwrap();

        assert_eq!(found.installed.len(), 1);
        assert_eq!(found.installed[0].version.as_deref(), Some("1.0.0"));
        assert_eq!(found.installed[0].display_version().as_deref(), Some("v1.0.0"));
        assert!(found.conditions.is_empty());
    }

    #[test]
    fn test_find_matches_slash_names() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "ntp", Some(r#"{"name": "acme/ntp"}"#));

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        assert_eq!(inventory.find("acme-ntp").unwrap().installed.len(), 1);
        assert_eq!(inventory.find("ntp").unwrap().installed.len(), 1);
    }

    #[test]
    fn test_find_module_without_metadata() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "ntp", None);

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let found = inventory.find("acme-ntp").unwrap();

        assert_eq!(found.installed.len(), 1);
        assert!(!found.installed[0].has_metadata());
        assert_eq!(found.installed[0].version, None);
    }

    #[test]
    fn test_find_ignores_broken_metadata_of_other_modules() {
        let root = TempDir::new().unwrap();
        write_module(
            root.path(),
            "ntp",
            Some(r#"{"name": "acme-ntp", "version": "1.0.0"}"#),
        );
        write_module(root.path(), "other", Some("{broken"));

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let found = inventory.find("acme-ntp").unwrap();
        assert_eq!(found.installed.len(), 1);
        assert_eq!(found.installed[0].version.as_deref(), Some("1.0.0"));

        assert!(inventory.find("acme-missing").unwrap().installed.is_empty());
        assert_eq!(inventory.list().unwrap().len(), 2);
    }

    #[test]
    fn test_find_reports_broken_metadata_of_requested_module() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "ntp", Some("{broken"));

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        assert!(matches!(
            inventory.find("acme-ntp"),
            Err(crate::error::Error::Parse(_))
        ));
    }

    #[test]
    fn test_find_orders_by_precedence() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_module(second.path(), "ntp", Some(r#"{"name": "acme-ntp", "version": "2.0.0"}"#));
        write_module(first.path(), "ntp", Some(r#"{"name": "acme-ntp", "version": "1.0.0"}"#));

        let inventory = ModulePathInventory::new(vec![
            first.path().to_path_buf(),
            PathBuf::from("/nonexistent/modules"),
            second.path().to_path_buf(),
        ]);
        let found = inventory.find("acme-ntp").unwrap();

        assert_eq!(found.installed.len(), 2);
        assert_eq!(found.installed[0].precedence, 0);
        assert_eq!(found.installed[0].modulepath, first.path());
        assert_eq!(found.installed[1].precedence, 2);
        assert_eq!(found.installed[1].version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_find_collects_conditions_from_dependents() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "stdlib", Some(r#"{"name": "acme-stdlib", "version": "2.1.0"}"#));
        write_module(
            root.path(),
            "ntp",
            Some(r#"{"name": "acme-ntp", "dependencies": [{"name": "acme/stdlib", "version_requirement": ">= 2.0.0 < 3.0.0"}]}"#),
        );
        write_module(
            root.path(),
            "apache",
            Some(r#"{"name": "acme-apache", "dependencies": [{"name": "acme-stdlib"}, {"name": "acme-concat"}]}"#),
        );

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let found = inventory.find("acme-stdlib").unwrap();

        assert_eq!(found.installed.len(), 1);
        assert_eq!(
            found.conditions,
            vec![
                Constraint::from_module("acme-apache", ">= 0.0.0"),
                Constraint::from_module("acme-ntp", ">= 2.0.0 < 3.0.0"),
            ]
        );
    }

    #[test]
    fn test_find_not_installed() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "ntp", Some(r#"{"name": "acme-ntp"}"#));

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        assert!(inventory.find("acme-apache").unwrap().installed.is_empty());
    }

    #[test]
    fn test_list_skips_files_and_hidden_dirs() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "ntp", None);
        write_module(root.path(), ".git", None);
        fs::write(root.path().join("README"), "not a module").unwrap();

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let modules = inventory.list().unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "ntp");
    }

    #[test]
    fn test_local_changes_detected() {
        let root = TempDir::new().unwrap();
        let path = write_module(root.path(), "ntp", None);
        fs::write(path.join("init.pp"), "class ntp {}").unwrap();
        let digest = changes::sha256_file(&path.join("init.pp")).unwrap();
        fs::write(
            path.join(metadata::METADATA_FILE),
            format!(r#"{{"name": "acme-ntp", "checksums": {{"init.pp": "{}"}}}}"#, digest),
        )
        .unwrap();

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let module = inventory.find("acme-ntp").unwrap().installed.remove(0);
        assert!(!inventory.has_local_changes(&module).unwrap());

        fs::write(path.join("init.pp"), "class ntp { edited }").unwrap();
        assert!(inventory.has_local_changes(&module).unwrap());
    }

    #[test]
    fn test_local_changes_without_metadata_or_checksums() {
        let root = TempDir::new().unwrap();
        write_module(root.path(), "bare", None);
        write_module(root.path(), "ntp", Some(r#"{"name": "acme-ntp"}"#));

        let inventory = ModulePathInventory::new(vec![root.path().to_path_buf()]);
        let bare = inventory.find("bare").unwrap().installed.remove(0);
        let ntp = inventory.find("acme-ntp").unwrap().installed.remove(0);

        assert!(!inventory.has_local_changes(&bare).unwrap());
        assert!(!inventory.has_local_changes(&ntp).unwrap());
    }
}
