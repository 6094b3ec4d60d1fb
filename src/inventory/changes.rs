// src/inventory/changes.rs

//! Detection of local modifications to an installed module
//!
//! Packaged modules record a SHA-256 digest for each shipped file. A module
//! has local changes when any recorded file is missing or hashes differently.

use crate::error::Result;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// Compute the hex SHA-256 digest of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// List the recorded files that were modified or removed under `module_dir`
///
/// Files are hashed in parallel; the result is sorted by relative path.
pub fn modified_files(module_dir: &Path, checksums: &BTreeMap<String, String>) -> Result<Vec<String>> {
    let results = checksums
        .par_iter()
        .map(|(relative, expected)| {
            let path = module_dir.join(relative);
            if !path.is_file() {
                debug!("Recorded file is missing: {}", path.display());
                return Ok(Some(relative.clone()));
            }

            let actual = sha256_file(&path)?;
            if actual.eq_ignore_ascii_case(expected) {
                Ok(None)
            } else {
                debug!("Checksum mismatch for {}", path.display());
                Ok(Some(relative.clone()))
            }
        })
        .collect::<Result<Vec<Option<String>>>>()?;

    // collect keeps the BTreeMap's path order
    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn checksums_for(dir: &Path, files: &[&str]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|f| (f.to_string(), sha256_file(&dir.join(f)).unwrap()))
            .collect()
    }

    #[test]
    fn test_sha256_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_unmodified_module() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("manifests")).unwrap();
        fs::write(dir.path().join("manifests/init.pp"), "class ntp {}").unwrap();
        fs::write(dir.path().join("README"), "ntp").unwrap();

        let checksums = checksums_for(dir.path(), &["manifests/init.pp", "README"]);
        assert!(modified_files(dir.path(), &checksums).unwrap().is_empty());
    }

    #[test]
    fn test_modified_and_missing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "original").unwrap();
        fs::write(dir.path().join("b.txt"), "original").unwrap();
        fs::write(dir.path().join("c.txt"), "original").unwrap();

        let checksums = checksums_for(dir.path(), &["a.txt", "b.txt", "c.txt"]);
        fs::write(dir.path().join("c.txt"), "edited").unwrap();
        fs::remove_file(dir.path().join("a.txt")).unwrap();

        let modified = modified_files(dir.path(), &checksums).unwrap();
        assert_eq!(modified, vec!["a.txt".to_string(), "c.txt".to_string()]);
    }
}
