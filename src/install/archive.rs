// src/install/archive.rs

//! Unpacking module archives into the modulepath
//!
//! Archives are tarballs compressed with gzip, xz or zstd. The archive is
//! unpacked into a staging directory next to its destination, so the final
//! step is a rename within one file system.

use super::{InstallOptions, Installer};
use crate::error::{Error, Result};
use crate::inventory::metadata::{self, METADATA_FILE};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Compression formats recognized by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompressionFormat {
    Gzip,
    Xz,
    Zstd,
}

/// Installer for tarball module archives
#[derive(Debug, Clone, Default)]
pub struct ArchiveInstaller;

impl ArchiveInstaller {
    pub fn new() -> Self {
        Self
    }

    fn detect_compression(path: &Path) -> Result<CompressionFormat> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 6];
        file.read_exact(&mut magic).map_err(|e| {
            Error::Archive(format!("Unable to read {}: {}", path.display(), e))
        })?;

        // gzip: 0x1F 0x8B
        if magic[0..2] == [0x1F, 0x8B] {
            return Ok(CompressionFormat::Gzip);
        }

        // xz: 0xFD '7zXZ' 0x00
        if magic == [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00] {
            return Ok(CompressionFormat::Xz);
        }

        // zstd: 0x28 0xB5 0x2F 0xFD
        if magic[0..4] == [0x28, 0xB5, 0x2F, 0xFD] {
            return Ok(CompressionFormat::Zstd);
        }

        Err(Error::Archive(format!(
            "Unable to detect archive compression for: {}",
            path.display()
        )))
    }

    fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
        let compression = Self::detect_compression(path)?;
        let file = File::open(path)?;

        let reader: Box<dyn Read> = match compression {
            CompressionFormat::Gzip => Box::new(GzDecoder::new(file)),
            CompressionFormat::Xz => Box::new(XzDecoder::new(file)),
            CompressionFormat::Zstd => {
                let decoder = zstd::Decoder::new(file).map_err(|e| {
                    Error::Archive(format!("Failed to create zstd decoder: {}", e))
                })?;
                Box::new(decoder)
            }
        };

        Ok(Archive::new(reader))
    }

    /// Locate the module inside an unpacked archive
    ///
    /// Either the unpack directory itself carries `metadata.json`, or it
    /// holds exactly one top-level directory.
    fn module_root(unpacked: &Path) -> Result<PathBuf> {
        if unpacked.join(METADATA_FILE).is_file() {
            return Ok(unpacked.to_path_buf());
        }

        let dirs = fs::read_dir(unpacked)?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect::<Vec<_>>();

        match dirs.as_slice() {
            [single] => Ok(single.clone()),
            _ => Err(Error::Archive(format!(
                "Archive has no single module directory ({} top-level directories)",
                dirs.len()
            ))),
        }
    }
}

impl Installer for ArchiveInstaller {
    fn install(
        &self,
        archive: &Path,
        dest: &Path,
        module_name: &str,
        options: &InstallOptions,
    ) -> Result<PathBuf> {
        let target_dir = dest
            .parent()
            .ok_or_else(|| Error::Archive(format!("No parent directory for {}", dest.display())))?;
        fs::create_dir_all(target_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".modtool-staging-")
            .tempdir_in(target_dir)?;

        let unpacked = staging.path().join("unpacked");
        fs::create_dir(&unpacked)?;
        Self::open_archive(archive)?
            .unpack(&unpacked)
            .map_err(|e| Error::Archive(format!("Failed to unpack {}: {}", archive.display(), e)))?;

        let root = Self::module_root(&unpacked)?;
        if let Some(meta) = metadata::load(&root)? {
            if metadata::normalize_name(&meta.name) != metadata::normalize_name(module_name) {
                if !options.force {
                    return Err(Error::Archive(format!(
                        "Archive {} contains '{}', not '{}'",
                        archive.display(),
                        meta.name,
                        module_name
                    )));
                }
                warn!("Installing '{}' from an archive of '{}'", module_name, meta.name);
            }
        }

        let previous = staging.path().join("previous");
        let replacing = dest.exists();
        if replacing {
            debug!("Moving {} aside", dest.display());
            fs::rename(dest, &previous)?;
        }

        if let Err(e) = fs::rename(&root, dest) {
            if replacing {
                fs::rename(&previous, dest)?;
            }
            return Err(Error::Archive(format!(
                "Failed to move {} into place: {}",
                dest.display(),
                e
            )));
        }

        // Dropping the staging directory removes the previous copy
        staging.close()?;
        info!("Installed '{}' into {}", module_name, dest.display());
        Ok(dest.to_path_buf())
    }
}
