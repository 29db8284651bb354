//! # Local Photo Cache Module
//!
//! Downloaded photos wait here until the wizard uploads or discards them.

use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::stage_files::{normalize_extension, DEFAULT_EXTENSION, STAGE_EXTENSIONS};

/// Extension for downloaded bytes: sniffed format first, then the original
/// file name, then `jpg`
pub fn detect_extension(bytes: &[u8], file_name: Option<&str>) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Gif) => "gif",
        _ => file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(normalize_extension)
            .unwrap_or(DEFAULT_EXTENSION),
    }
}

/// Six random alphanumeric characters, lowercase
pub fn random_suffix() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

fn is_photo_name(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| STAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Directory holding photos between download and upload
#[derive(Debug, Clone)]
pub struct PhotoCache {
    dir: PathBuf,
}

impl PhotoCache {
    /// Open the cache, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create photo directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save bytes under a fresh unique name, returning the path and extension
    pub fn store_bytes(&self, bytes: &[u8], file_name: Option<&str>) -> Result<(PathBuf, String)> {
        let extension = detect_extension(bytes, file_name);
        let mut file = Builder::new()
            .prefix("photo_")
            .suffix(&format!(".{extension}"))
            .tempfile_in(&self.dir)
            .context("Failed to create local photo file")?;
        file.write_all(bytes).context("Failed to write local photo")?;
        let (_, path) = file.keep().context("Failed to keep local photo")?;
        debug!(path = %path.display(), size = bytes.len(), "Stored photo locally");
        Ok((path, extension.to_string()))
    }

    /// Names of cached photos, sorted
    pub fn list_photos(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_photo_name(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete a file; a file that is already gone is not an error
    pub fn delete(&self, path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted local photo");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    /// Delete without reporting, for cleanup paths
    pub fn discard(&self, path: &Path) {
        if let Err(e) = self.delete(path) {
            warn!(error = %e, "Failed to discard local photo");
        }
    }

    /// Delete visible files last modified more than `max_age` ago, except
    /// the ones listed in `in_use`
    pub fn cleanup_older_than(&self, max_age: Duration, in_use: &[PathBuf]) -> Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let keep: HashSet<OsString> = in_use
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_os_string())
            .collect();
        let mut deleted = 0;

        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
        {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            if keep.contains(&name) {
                debug!(path = %entry.path().display(), "Skipping photo of an open dialog");
                continue;
            }
            let modified = match entry.metadata().and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Could not stat local file");
                    continue;
                }
            };
            if modified < cutoff && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                match self.delete(&entry.path()) {
                    Ok(true) => deleted += 1,
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Cleanup could not delete file"),
                }
            }
        }

        if deleted > 0 {
            info!(deleted, "Old local photos removed");
        }
        Ok(deleted)
    }
}
