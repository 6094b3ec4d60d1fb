// src/repository/mod.rs

//! Remote module repository access
//!
//! A [`RemoteRegistry`] answers which releases exist for a module. The
//! forge implementation lives in `forge`, and `cache` keeps its answers in
//! the local release database.

pub mod cache;
pub mod forge;

use crate::error::{Error, Result};
use crate::inventory::ModuleDependency;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use cache::CachedRegistry;
pub use forge::{ForgeClient, ForgeFetcher};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// A published release of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRelease {
    pub version: String,
    /// Location of the release archive, relative to the repository or absolute
    pub file_uri: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,
}

impl RemoteRelease {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            file_uri: None,
            dependencies: Vec::new(),
        }
    }
}

/// Source of published module releases
pub trait RemoteRegistry {
    /// Repository location, used in user-facing messages
    fn uri(&self) -> &str;

    /// Fetch every published release of a module, oldest first
    ///
    /// Fails on transport errors and when the repository does not know the
    /// module. A known module with no releases yields an empty list.
    fn releases(&self, module_name: &str) -> Result<Vec<RemoteRelease>>;
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("modtool/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Override the number of attempts made per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Send a GET request, retrying on transport failures
    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Err(Error::NotFound(url.to_string()));
                    }
                    if !status.is_success() {
                        return Err(Error::Download(format!("HTTP {} from {}", status, url)));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "Request to {} failed after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Request attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Fetch and decode a JSON document
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Fetching {}", url);
        let response = self.get(url)?;
        response
            .json()
            .map_err(|e| Error::Download(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    /// Download a file to the specified path with retry support
    ///
    /// The body is written to a temporary sibling and renamed into place, so
    /// an interrupted download never leaves a partial file at `dest_path`.
    pub fn download_file(&self, url: &str, dest_path: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest_path.display());

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut response = self.get(url)?;

        let temp_path = dest_path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        if let Err(e) = io::copy(&mut response, &mut file) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Download(format!(
                "Failed to write downloaded data from {}: {}",
                url, e
            )));
        }

        fs::rename(&temp_path, dest_path)?;
        debug!("Downloaded {}", dest_path.display());
        Ok(())
    }
}

/// Join a repository base URL and a path
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Get current timestamp as RFC 3339 string
pub(crate) fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 timestamp to Unix seconds
pub(crate) fn parse_timestamp(timestamp: &str) -> Result<i64> {
    let dt = chrono::DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| Error::Parse(format!("Invalid timestamp '{}': {}", timestamp, e)))?;
    Ok(dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://forge.example.com/", "/v3/files/a.tar.gz"),
            "https://forge.example.com/v3/files/a.tar.gz"
        );
        assert_eq!(
            join_url("https://forge.example.com", "v3/releases"),
            "https://forge.example.com/v3/releases"
        );
        assert_eq!(
            join_url("https://forge.example.com", "https://cdn.example.com/a.tar.gz"),
            "https://cdn.example.com/a.tar.gz"
        );
    }

    #[test]
    fn test_timestamp_functions() {
        let ts = current_timestamp();
        let parsed = parse_timestamp(&ts).unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!((now - parsed).abs() < 5);

        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_download_file() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/files/a.tar.gz")
            .with_status(200)
            .with_body("archive-bytes")
            .create();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/a.tar.gz");
        let client = RepositoryClient::new().unwrap();
        client
            .download_file(&format!("{}/files/a.tar.gz", server.url()), &dest)
            .unwrap();

        mock.assert();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "archive-bytes");
        assert!(!dest.with_extension("tmp").exists());
    }

    #[test]
    fn test_get_maps_status_codes() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/missing").with_status(404).create();
        server.mock("GET", "/broken").with_status(500).create();

        let client = RepositoryClient::new().unwrap();
        let missing: Result<serde_json::Value> =
            client.get_json(&format!("{}/missing", server.url()));
        let broken: Result<serde_json::Value> =
            client.get_json(&format!("{}/broken", server.url()));

        assert!(matches!(missing, Err(Error::NotFound(_))));
        assert!(matches!(broken, Err(Error::Download(_))));
    }

    #[test]
    fn test_transport_failure_stops_after_max_retries() {
        let client = RepositoryClient::new().unwrap().with_max_retries(1);
        let result: Result<serde_json::Value> = client.get_json("http://127.0.0.1:1/releases");

        match result {
            Err(Error::Download(message)) => assert!(message.contains("after 1 attempts")),
            other => panic!("expected download error, got {:?}", other.map(|_| ())),
        }
    }
}
