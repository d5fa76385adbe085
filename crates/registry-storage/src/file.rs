//! Local filesystem persistence backend.
//!
//! Persists the whole model as a single pretty-printed JSON file, written
//! atomically via a sibling temp file plus rename so a crash mid-write never
//! leaves a corrupt file in place of a good one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use registry_core::{Backend as _, RegistryError, RegistryResult, RootContainer};
use tracing::{debug, warn};

use crate::error::{BackendError, ErrorCategory, Operation};

/// Above this size, a warning is logged after each successful persist.
const WARN_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Filesystem-backed [`registry_core::Backend`].
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Open (or initialize) the backend at `path`. A missing file is treated
    /// as an empty model: the parent directory is created and an empty
    /// model is written immediately so later reads are consistent.
    ///
    /// `token`, if supplied, is ignored with a warning: the file backend has
    /// no notion of credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] if the directory cannot be
    /// created, or [`RegistryError::StorageUnavailable`] if an existing file
    /// cannot be parsed.
    pub fn open(path: impl AsRef<Path>, token: Option<&str>) -> RegistryResult<Self> {
        if token.is_some() {
            warn!("a storage token was supplied for the file backend; it is ignored");
        }
        let path = path.as_ref().to_path_buf();
        let backend = Self { path };

        if backend.path.exists() {
            // Validate up front: an unparsable file must fail at startup
            // rather than be silently overwritten by the first write.
            backend.load()?;
        } else {
            if let Some(parent) = backend.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| {
                        RegistryError::InvalidConfig(format!(
                            "failed to create directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
            backend.write_atomic(&RootContainer::default())?;
        }
        Ok(backend)
    }

    fn write_atomic(&self, state: &RootContainer) -> RegistryResult<()> {
        let json = serde_json::to_vec_pretty(state).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to serialize model: {e}"),
            )
        })?;

        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut temp = if let Some(dir) = dir {
            tempfile::NamedTempFile::new_in(dir)
        } else {
            tempfile::NamedTempFile::new()
        }
        .map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to create temp file: {e}"),
            )
        })?;

        temp.write_all(&json).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to write temp file: {e}"),
            )
        })?;
        temp.as_file().sync_all().map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to fsync temp file: {e}"),
            )
        })?;

        temp.persist(&self.path).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Persist,
                format!("failed to rename temp file into place: {e}"),
            )
        })?;

        if json.len() as u64 > WARN_SIZE_BYTES {
            warn!(
                bytes = json.len(),
                path = %self.path.display(),
                "persisted registry model exceeds the recommended 50MB size"
            );
        }
        debug!(path = %self.path.display(), bytes = json.len(), "persisted registry model");
        Ok(())
    }
}

impl registry_core::Backend for FileBackend {
    fn load(&self) -> RegistryResult<RootContainer> {
        let bytes = fs::read(&self.path).map_err(|e| {
            BackendError::new(
                ErrorCategory::Storage,
                Operation::Load,
                format!("failed to read {}: {e}", self.path.display()),
            )
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RegistryError::InvalidConfig(format!(
                "persisted state at {} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }

    fn persist(&self, state: &RootContainer) -> RegistryResult<()> {
        self.write_atomic(state)
    }
}
