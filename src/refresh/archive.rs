//! ZIP 压缩包校验与解压

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::errors::{IpGeoError, Result};

/// Local file header signature `PK\x03\x04`
pub const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Reject empty files and anything that does not start with a ZIP local header
pub fn validate_signature(path: &Path) -> Result<()> {
    let mut file = File::open(path).map_err(|e| {
        IpGeoError::file_operation(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..])? {
            0 => break,
            n => filled += n,
        }
    }

    if filled == 0 {
        return Err(IpGeoError::invalid_archive(format!(
            "Downloaded file {} is empty",
            path.display()
        )));
    }
    if filled < magic.len() || magic != ZIP_SIGNATURE {
        return Err(IpGeoError::invalid_archive(format!(
            "Downloaded file {} is not a valid ZIP archive",
            path.display()
        )));
    }
    Ok(())
}

/// Extract the entry named exactly `entry_name` to `dest`, returning its size
pub fn extract_entry(archive: &Path, entry_name: &str, dest: &Path) -> Result<u64> {
    let file = File::open(archive).map_err(|e| {
        IpGeoError::file_operation(format!("Failed to open {}: {}", archive.display(), e))
    })?;
    let mut zip = ZipArchive::new(file)?;

    let mut entry = match zip.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(IpGeoError::invalid_archive(format!(
                "Archive {} has no entry named {}",
                archive.display(),
                entry_name
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let out = File::create(dest).map_err(|e| {
        IpGeoError::file_operation(format!("Failed to create {}: {}", dest.display(), e))
    })?;
    let mut writer = BufWriter::new(out);
    // 解压失败（CRC、截断）视为压缩包损坏
    let written = io::copy(&mut entry, &mut writer).map_err(|e| {
        IpGeoError::invalid_archive(format!("Failed to extract {}: {}", entry_name, e))
    })?;
    writer.flush()?;

    debug!("Extracted {} ({} bytes) to {}", entry_name, written, dest.display());
    Ok(written)
}

/// Removes transient files when dropped unless they were kept
#[derive(Debug, Default)]
pub struct StagingFiles {
    paths: Vec<PathBuf>,
}

impl StagingFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Stop tracking `path` (it was renamed into place)
    pub fn keep(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed staging file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove staging file {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for StagingFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}
