// src/install/mod.rs

//! Installing resolved modules
//!
//! The upgrade workflow hands a resolution graph to the pipeline, which
//! fetches one archive per node and unpacks each into its install path.
//! Fetching and unpacking sit behind traits so the workflow can be driven
//! by other transports or tested without touching the network.

pub mod archive;
pub mod pipeline;

use crate::error::Result;
use crate::resolver::GraphNode;
use std::path::{Path, PathBuf};

pub use archive::ArchiveInstaller;
pub use pipeline::install_graph;

/// Options passed through to every install step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Install even when the archive's metadata names another module
    pub force: bool,
}

/// Produces a local archive for a planned module
pub trait ArchiveFetcher {
    fn fetch(&self, node: &GraphNode) -> Result<PathBuf>;
}

/// Unpacks a module archive into a modulepath directory
pub trait Installer {
    /// Install `archive` as `module_name` into `dest`
    ///
    /// `dest` is the module's own directory; any copy already there is
    /// replaced. Returns the directory the module now lives in.
    fn install(
        &self,
        archive: &Path,
        dest: &Path,
        module_name: &str,
        options: &InstallOptions,
    ) -> Result<PathBuf>;
}
