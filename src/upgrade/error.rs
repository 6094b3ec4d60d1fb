// src/upgrade/error.rs

//! Reasons an upgrade stops early
//!
//! Each variant carries what is needed for both renderings: `Display` gives
//! the one-line summary and [`UpgradeError::multiline`] the detailed form
//! shown to users.

use super::RequestedVersion;
use crate::error::Error;
use crate::inventory::{Constraint, ConstraintSource, InstalledModule};
use std::error::Error as StdError;
use std::fmt::Write;

/// Why an upgrade did not happen
#[derive(thiserror::Error, Debug)]
pub enum UpgradeError {
    #[error("Could not upgrade '{module_name}'; module is not installed")]
    NotInstalled { module_name: String },

    #[error("Could not upgrade '{module_name}'; module appears in multiple places in the module path")]
    MultipleInstalled {
        module_name: String,
        /// Ordered by ascending search path precedence
        installed_modules: Vec<InstalledModule>,
    },

    #[error("Could not upgrade '{module_name}'; module has had changes made locally")]
    LocalChanges {
        module_name: String,
        installed_version: Option<String>,
        requested_version: RequestedVersion,
    },

    #[error("Could not upgrade '{module_name}'; module is unknown to {repository}")]
    UnknownModule {
        module_name: String,
        installed_version: Option<String>,
        requested_version: RequestedVersion,
        repository: String,
        #[source]
        source: Error,
    },

    #[error("Could not upgrade '{module_name}'; no releases are available from {repository}")]
    UnknownVersion {
        module_name: String,
        installed_version: Option<String>,
        requested_version: RequestedVersion,
        repository: String,
    },

    #[error("Could not upgrade '{module_name}'; a newer version is not available")]
    VersionAlreadyInstalled {
        module_name: String,
        installed_version: Option<String>,
        /// The request, qualified with the newest release when implicit
        /// (`latest: v2.0.0`)
        requested_version: String,
        /// Constraints from dependents, plus the request itself
        conditions: Vec<Constraint>,
    },

    /// Anything else a collaborator reported
    #[error(transparent)]
    Other(#[from] Error),
}

impl UpgradeError {
    /// Stable identifier for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            UpgradeError::NotInstalled { .. } => "not_installed",
            UpgradeError::MultipleInstalled { .. } => "multiple_installed",
            UpgradeError::LocalChanges { .. } => "local_changes",
            UpgradeError::UnknownModule { .. } => "unknown_module",
            UpgradeError::UnknownVersion { .. } => "unknown_version",
            UpgradeError::VersionAlreadyInstalled { .. } => "version_already_installed",
            UpgradeError::Other(_) => "other",
        }
    }

    /// Whether this outcome means "nothing to do" rather than a failure
    pub fn is_noop(&self) -> bool {
        matches!(self, UpgradeError::VersionAlreadyInstalled { .. })
    }

    /// Detailed, indented rendering for terminal output
    pub fn multiline(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_multiline(&mut out);
        out
    }

    fn write_multiline(&self, out: &mut String) -> std::fmt::Result {
        match self {
            UpgradeError::NotInstalled { module_name } => {
                writeln!(out, "Could not upgrade module '{}'", module_name)?;
                writeln!(out, "  Module '{}' is not installed", module_name)?;
                write!(
                    out,
                    "    Check the module name, or use the `--modulepath` option to search other directories"
                )
            }
            UpgradeError::MultipleInstalled {
                module_name,
                installed_modules,
            } => {
                writeln!(out, "Could not upgrade module '{}'", module_name)?;
                writeln!(
                    out,
                    "  Module '{}' appears multiple places in the module path",
                    module_name
                )?;
                for module in installed_modules {
                    writeln!(
                        out,
                        "    '{}' ({}) was found in {}",
                        module_name,
                        module.display_version().as_deref().unwrap_or("???"),
                        module.modulepath.display()
                    )?;
                }
                write!(
                    out,
                    "    Use the `--modulepath` option to limit the search to specific directories"
                )
            }
            UpgradeError::LocalChanges {
                module_name,
                installed_version,
                requested_version,
            } => {
                write_heading(out, module_name, installed_version.as_deref(), &requested_version.to_string())?;
                writeln!(out, "  Installed module has had changes made locally")?;
                write!(
                    out,
                    "    Use `modtool upgrade --force` to upgrade this module anyway"
                )
            }
            UpgradeError::UnknownModule {
                module_name,
                installed_version,
                requested_version,
                repository,
                source,
            } => {
                write_heading(out, module_name, installed_version.as_deref(), &requested_version.to_string())?;
                writeln!(out, "  Module '{}' does not exist on {}", module_name, repository)?;
                write!(out, "    {}", source)
            }
            UpgradeError::UnknownVersion {
                module_name,
                installed_version,
                requested_version,
                repository,
            } => {
                write_heading(out, module_name, installed_version.as_deref(), &requested_version.to_string())?;
                write!(out, "  No releases of '{}' were found on {}", module_name, repository)
            }
            UpgradeError::VersionAlreadyInstalled {
                module_name,
                installed_version,
                requested_version,
                conditions,
            } => {
                write_heading(out, module_name, installed_version.as_deref(), requested_version)?;
                writeln!(
                    out,
                    "  The installed version is already the best fit for the current dependencies"
                )?;
                for condition in conditions {
                    match (&condition.source, &condition.requirement) {
                        (ConstraintSource::Request, Some(version)) => {
                            writeln!(out, "    You specified '{}'", version)?;
                        }
                        (ConstraintSource::Request, None) => {}
                        (ConstraintSource::Module(name), requirement) => {
                            writeln!(
                                out,
                                "    '{}' requires '{}'",
                                name,
                                requirement.as_deref().unwrap_or(">= 0.0.0")
                            )?;
                        }
                    }
                }
                write!(
                    out,
                    "    Use `modtool upgrade --force` to reinstall the current version"
                )
            }
            UpgradeError::Other(err) => {
                write!(out, "{}", err)?;
                let mut source = err.source();
                while let Some(cause) = source {
                    write!(out, "\n  Caused by: {}", cause)?;
                    source = cause.source();
                }
                Ok(())
            }
        }
    }
}

fn write_heading(
    out: &mut String,
    module_name: &str,
    installed_version: Option<&str>,
    requested_version: &str,
) -> std::fmt::Result {
    writeln!(
        out,
        "Could not upgrade module '{}' ({} -> {})",
        module_name,
        installed_version.unwrap_or("???"),
        requested_version
    )
}
