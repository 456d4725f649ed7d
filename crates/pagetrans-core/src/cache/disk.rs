use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::key::ARTIFACT_SUFFIX;
use crate::error::{Error, Result};

/// Durable page cache: one PDF file per key in a flat directory.
///
/// The directory is created on the first write and never cleaned up
/// automatically. Writes go to a temp file in the same directory and are
/// renamed into place, so readers only ever see complete artifacts; two
/// writers racing on one key leave whichever rename lands last.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Load a cached artifact. Missing, unreadable and corrupt entries are
    /// all misses.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache read error for {}: {}", path.display(), e);
                return None;
            }
        };

        if let Err(reason) = validate_artifact(&bytes) {
            warn!("Ignoring corrupt cache entry {}: {}", path.display(), reason);
            return None;
        }

        Some(bytes)
    }

    /// Store an artifact, replacing any previous entry for the key.
    pub fn insert(&self, key: &str, value: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::CacheWrite(format!(
                "Failed to create cache directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::CacheWrite(format!("Failed to create temp file: {e}")))?;
        tmp.write_all(value)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::CacheWrite(format!("Failed to write {key}: {e}")))?;

        let path = self.path_for(key);
        tmp.persist(&path)
            .map_err(|e| Error::CacheWrite(format!("Failed to move {} into place: {}", key, e.error)))?;

        debug!("Stored {} ({} bytes)", path.display(), value.len());
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Delete every cached artifact, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.artifact_paths()? {
            std::fs::remove_file(&path)
                .map_err(|e| Error::CacheWrite(format!("Failed to remove {}: {}", path.display(), e)))?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.artifact_paths().map_or(0, |paths| paths.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn artifact_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::CacheRead(format!("{}: {}", self.dir.display(), e))),
        };

        Ok(entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX))
            })
            .collect())
    }
}

/// A usable artifact parses as a PDF with at least one page.
fn validate_artifact(bytes: &[u8]) -> std::result::Result<(), String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    if doc.get_pages().is_empty() {
        return Err("document has no pages".to_string());
    }
    Ok(())
}
