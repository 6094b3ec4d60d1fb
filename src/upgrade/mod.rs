// src/upgrade/mod.rs

//! Upgrading an installed module
//!
//! An upgrade runs a fixed sequence of gates:
//!
//! 1. find the single local installation
//! 2. refuse modules with local changes
//! 3. list the releases the repository publishes
//! 4. stop early when the newest release is already installed
//! 5. resolve the installation graph
//! 6. fetch and install every graph node
//!
//! Each gate either hands its context to the next one or stops with an
//! [`UpgradeError`]. Whatever happens, [`upgrade`] returns a complete
//! [`UpgradeResult`]; errors never escape it.

pub mod error;
pub mod report;

use crate::install::{self, ArchiveFetcher, InstallOptions, Installer};
use crate::inventory::{Constraint, InstalledModule, LocalInventory};
use crate::repository::{RemoteRegistry, RemoteRelease};
use crate::resolver::{ConstraintResolver, GraphNode, ResolveRequest};
use crate::version;
use std::fmt;
use tracing::{debug, info};

pub use error::UpgradeError;
pub use report::{ErrorReport, Outcome, UpgradeResult};

/// Options recognized by an upgrade request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeOptions {
    /// Bypass the local-changes and already-installed gates
    pub force: bool,
    /// Do not let other installed modules constrain the choice
    pub ignore_dependencies: bool,
    /// Explicit version or requirement to upgrade to
    pub version: Option<String>,
}

impl UpgradeOptions {
    /// Forcing an upgrade also ignores dependencies
    pub fn ignores_dependencies(&self) -> bool {
        self.force || self.ignore_dependencies
    }
}

/// What the caller asked to upgrade to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedVersion {
    /// A version given explicitly
    Explicit(String),
    /// Newest release, nothing else constrains the module
    Latest,
    /// Newest release allowed by the modules that depend on this one
    Best,
}

impl fmt::Display for RequestedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestedVersion::Explicit(version) => f.write_str(version),
            RequestedVersion::Latest => f.write_str("latest"),
            RequestedVersion::Best => f.write_str("best"),
        }
    }
}

/// The services an upgrade is carried out with
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub inventory: &'a dyn LocalInventory,
    pub registry: &'a dyn RemoteRegistry,
    pub resolver: &'a dyn ConstraintResolver,
    pub fetcher: &'a dyn ArchiveFetcher,
    pub installer: &'a dyn Installer,
}

/// Context once the module to upgrade has been located
#[derive(Debug, Clone)]
struct Located {
    module: InstalledModule,
    installed_version: Option<String>,
    requested_version: RequestedVersion,
    conditions: Vec<Constraint>,
}

type Step<T> = std::result::Result<T, UpgradeError>;

/// Runs one upgrade request
pub struct Upgrader<'a> {
    module_name: String,
    options: UpgradeOptions,
    with: Collaborators<'a>,
}

impl<'a> Upgrader<'a> {
    pub fn new(module_name: impl Into<String>, options: UpgradeOptions, with: Collaborators<'a>) -> Self {
        Self {
            module_name: module_name.into(),
            options,
            with,
        }
    }

    /// Run every gate and report the outcome
    pub fn run(&self) -> UpgradeResult {
        let result = UpgradeResult::new(&self.module_name);

        let located = match self.gather_local() {
            Ok(located) => located,
            Err(err) => return result.stopped(&err),
        };
        let result = result.with_versions(
            located.installed_version.clone(),
            located.requested_version.to_string(),
        );

        let outcome = self
            .check_local_changes(&located)
            .and_then(|()| self.gather_remote(&located))
            .and_then(|releases| self.check_already_installed(&located, &releases))
            .and_then(|()| self.resolve())
            .and_then(|graph| self.install(&graph).map(|()| graph));

        match outcome {
            Ok(graph) => result.succeeded(graph),
            Err(err) => {
                debug!("Upgrade of '{}' stopped: {}", self.module_name, err.kind());
                result.stopped(&err)
            }
        }
    }

    fn gather_local(&self) -> Step<Located> {
        let found = self.with.inventory.find(&self.module_name)?;
        let mut installed = found.installed;

        let module = match installed.len() {
            0 => {
                return Err(UpgradeError::NotInstalled {
                    module_name: self.module_name.clone(),
                });
            }
            1 => installed.remove(0),
            _ => {
                installed.sort_by_key(|m| m.precedence);
                return Err(UpgradeError::MultipleInstalled {
                    module_name: self.module_name.clone(),
                    installed_modules: installed,
                });
            }
        };

        let requested_version = match &self.options.version {
            Some(version) => RequestedVersion::Explicit(version.clone()),
            None if found.conditions.is_empty() => RequestedVersion::Latest,
            None => RequestedVersion::Best,
        };
        let installed_version = module.display_version();

        info!(
            "Found '{}' ({}) in {} ...",
            self.module_name,
            installed_version.as_deref().unwrap_or("???"),
            module.modulepath.display()
        );

        Ok(Located {
            module,
            installed_version,
            requested_version,
            conditions: found.conditions,
        })
    }

    fn check_local_changes(&self, located: &Located) -> Step<()> {
        if self.options.force {
            return Ok(());
        }
        if !located.module.has_metadata() {
            debug!(
                "'{}' has no metadata; skipping the local changes check",
                self.module_name
            );
            return Ok(());
        }

        if self.with.inventory.has_local_changes(&located.module)? {
            return Err(UpgradeError::LocalChanges {
                module_name: self.module_name.clone(),
                installed_version: located.installed_version.clone(),
                requested_version: located.requested_version.clone(),
            });
        }
        Ok(())
    }

    fn gather_remote(&self, located: &Located) -> Step<Vec<RemoteRelease>> {
        let releases = match self.with.registry.releases(&self.module_name) {
            Ok(releases) => releases,
            Err(source) => {
                return Err(UpgradeError::UnknownModule {
                    module_name: self.module_name.clone(),
                    installed_version: located.installed_version.clone(),
                    requested_version: located.requested_version.clone(),
                    repository: self.with.registry.uri().to_string(),
                    source,
                });
            }
        };

        if releases.is_empty() {
            return Err(UpgradeError::UnknownVersion {
                module_name: self.module_name.clone(),
                installed_version: located.installed_version.clone(),
                requested_version: located.requested_version.clone(),
                repository: self.with.registry.uri().to_string(),
            });
        }
        Ok(releases)
    }

    fn check_already_installed(&self, located: &Located, releases: &[RemoteRelease]) -> Step<()> {
        if self.options.force {
            return Ok(());
        }

        // `gather_remote` has already rejected an empty release list
        let Some(newest) = releases
            .iter()
            .max_by(|a, b| version::compare(&a.version, &b.version))
        else {
            return Ok(());
        };

        let newest = version::normalize(Some(&newest.version));
        let current = version::normalize(located.module.version.as_deref());
        if newest != current {
            return Ok(());
        }

        let requested_version = match &located.requested_version {
            RequestedVersion::Explicit(version) => version.clone(),
            implicit => format!("{}: {}", implicit, newest),
        };

        let mut conditions = located.conditions.clone();
        conditions.push(Constraint::from_request(self.options.version.as_deref()));

        Err(UpgradeError::VersionAlreadyInstalled {
            module_name: self.module_name.clone(),
            installed_version: located.installed_version.clone(),
            requested_version,
            conditions,
        })
    }

    fn resolve(&self) -> Step<Vec<GraphNode>> {
        let request = ResolveRequest {
            module_name: self.module_name.clone(),
            requested_version: self.options.version.clone(),
            ignore_dependencies: self.options.ignores_dependencies(),
            force: self.options.force,
        };
        Ok(self.with.resolver.resolve(&request)?)
    }

    fn install(&self, graph: &[GraphNode]) -> Step<()> {
        if graph.is_empty() {
            info!("'{}' needs no changes", self.module_name);
            return Ok(());
        }

        info!("Upgrading -- do not interrupt ...");
        let options = InstallOptions {
            force: self.options.force,
        };
        install::install_graph(graph, self.with.fetcher, self.with.installer, &options)?;
        Ok(())
    }
}

/// Upgrade `module_name` and report what happened
pub fn upgrade(module_name: &str, options: UpgradeOptions, with: Collaborators<'_>) -> UpgradeResult {
    Upgrader::new(module_name, options, with).run()
}
