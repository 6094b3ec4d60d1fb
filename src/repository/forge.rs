// src/repository/forge.rs

//! Module forge client
//!
//! Talks to a forge-style HTTP API:
//! - `GET /v3/releases?module=<author-name>` lists releases, paginated
//!   through `pagination.next`
//! - each release names its archive through `file_uri`

use super::{RemoteRegistry, RemoteRelease, RepositoryClient, join_url};
use crate::error::{Error, Result};
use crate::install::ArchiveFetcher;
use crate::inventory::ModuleDependency;
use crate::inventory::metadata::normalize_name;
use crate::resolver::GraphNode;
use crate::version;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Releases requested per page
const PAGE_SIZE: usize = 100;

/// Upper bound on followed pages, in case a server loops its `next` links
const MAX_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct ReleasePage {
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    results: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    version: String,
    #[serde(default)]
    file_uri: Option<String>,
    #[serde(default)]
    metadata: Option<ReleaseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseMetadata {
    #[serde(default)]
    dependencies: Vec<ModuleDependency>,
}

impl From<ReleaseEntry> for RemoteRelease {
    fn from(entry: ReleaseEntry) -> Self {
        Self {
            version: entry.version,
            file_uri: entry.file_uri,
            dependencies: entry.metadata.unwrap_or_default().dependencies,
        }
    }
}

/// Release metadata client for a module forge
pub struct ForgeClient {
    base_url: String,
    client: RepositoryClient,
}

impl ForgeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(base_url, RepositoryClient::new()?))
    }

    pub fn with_client(base_url: impl Into<String>, client: RepositoryClient) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

impl RemoteRegistry for ForgeClient {
    fn uri(&self) -> &str {
        &self.base_url
    }

    fn releases(&self, module_name: &str) -> Result<Vec<RemoteRelease>> {
        let mut url = join_url(
            &self.base_url,
            &format!(
                "v3/releases?module={}&limit={}",
                normalize_name(module_name),
                PAGE_SIZE
            ),
        );

        let mut releases = Vec::new();
        for _ in 0..MAX_PAGES {
            let page: ReleasePage = self.client.get_json(&url)?;
            releases.extend(page.results.into_iter().map(RemoteRelease::from));

            match page.pagination.and_then(|p| p.next) {
                Some(next) => url = join_url(&self.base_url, &next),
                None => break,
            }
        }

        releases.sort_by(|a, b| version::compare(&a.version, &b.version));
        info!(
            "Found {} release(s) of '{}' on {}",
            releases.len(),
            module_name,
            self.base_url
        );
        Ok(releases)
    }
}

/// Downloads release archives from a forge into a local archive cache
pub struct ForgeFetcher {
    base_url: String,
    archive_dir: PathBuf,
    client: RepositoryClient,
}

impl ForgeFetcher {
    pub fn new(base_url: impl Into<String>, archive_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            archive_dir: archive_dir.into(),
            client: RepositoryClient::new()?,
        })
    }
}

impl ArchiveFetcher for ForgeFetcher {
    fn fetch(&self, node: &GraphNode) -> Result<PathBuf> {
        let file_uri = node.file_uri.as_deref().ok_or_else(|| {
            Error::NotFound(format!(
                "No archive published for {} {}",
                node.module_name, node.version
            ))
        })?;

        let dest = self.archive_dir.join(format!(
            "{}-{}.tar.gz",
            normalize_name(&node.module_name),
            version::ModuleVersion::new(Some(&node.version)).number()
        ));

        if dest.is_file() {
            debug!("Using cached archive {}", dest.display());
            return Ok(dest);
        }

        self.client
            .download_file(&join_url(&self.base_url, file_uri), &dest)?;
        Ok(dest)
    }
}
