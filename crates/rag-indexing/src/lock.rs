//! Per-path build lock.
//!
//! A sibling `<index>.lock` file, created exclusively. Held for the whole
//! build or clean and removed on drop.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rag_vector::sibling;
use tracing::{debug, warn};

use crate::error::IndexingError;

pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Take the lock for the index at `index_path`.
    pub fn acquire(index_path: &Path) -> Result<Self, IndexingError> {
        let path = sibling(index_path, ".lock");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(IndexingError::Busy { lock: path });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;

        debug!(lock = ?path, "Acquired build lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(lock = ?self.path, error = %e, "Failed to remove build lock");
        }
    }
}
