// src/install/pipeline.rs

//! Installs a resolution graph node by node

use super::{ArchiveFetcher, InstallOptions, Installer};
use crate::error::Result;
use crate::resolver::GraphNode;
use std::path::PathBuf;
use tracing::debug;

/// Fetch an archive for every node, then install them in graph order
///
/// Every archive is fetched before anything is unpacked, so a failed
/// download leaves the module tree untouched. Nodes are neither reordered
/// nor deduplicated. Returns the installed module directories.
pub fn install_graph(
    graph: &[GraphNode],
    fetcher: &dyn ArchiveFetcher,
    installer: &dyn Installer,
    options: &InstallOptions,
) -> Result<Vec<PathBuf>> {
    let archives = graph
        .iter()
        .map(|node| fetcher.fetch(node))
        .collect::<Result<Vec<_>>>()?;

    let mut installed = Vec::with_capacity(graph.len());
    for (node, archive) in graph.iter().zip(&archives) {
        debug!(
            "Installing '{}' {} from {}",
            node.module_name,
            node.version,
            archive.display()
        );
        installed.push(installer.install(archive, &node.module_dir(), &node.module_name, options)?);
    }

    Ok(installed)
}
