//! Index lifecycle: state detection, drop, and staged replacement.
//!
//! A build never writes into the live directory. It fills a sibling
//! staging directory and [`promote_staging`] swaps it in, so a reader sees
//! either the old complete index or the new one.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::VectorError;
use crate::store::{IndexManifest, MANIFEST_FILE};

/// What exists at an index path before a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Nothing at the path
    Absent,
    /// A directory with no usable records
    PresentEmpty,
    /// A complete index holding at least one record
    PresentNonEmpty,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexState::Absent => "absent",
            IndexState::PresentEmpty => "present-empty",
            IndexState::PresentNonEmpty => "present-nonempty",
        })
    }
}

/// Inspect `path` without opening the record store.
pub fn detect_state(path: &Path) -> IndexState {
    if !path.exists() {
        return IndexState::Absent;
    }
    if !path.join(MANIFEST_FILE).exists() {
        return IndexState::PresentEmpty;
    }
    match IndexManifest::load(path) {
        Ok(manifest) if manifest.record_count > 0 => IndexState::PresentNonEmpty,
        Ok(_) => IndexState::PresentEmpty,
        Err(e) => {
            warn!(path = ?path, error = %e, "Unreadable manifest, treating index as empty");
            IndexState::PresentEmpty
        }
    }
}

/// Sibling path `<path><suffix>`, e.g. `index.staging`.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index".into());
    name.push(suffix);
    path.with_file_name(name)
}

/// Where a build writes before the swap.
pub fn staging_path(path: &Path) -> PathBuf {
    sibling(path, ".staging")
}

/// Where the old index sits during the swap.
pub fn previous_path(path: &Path) -> PathBuf {
    sibling(path, ".previous")
}

/// Delete the index at `path`. Returns whether anything was removed.
pub fn drop_index(path: &Path) -> Result<bool, VectorError> {
    if !path.exists() {
        info!(path = ?path, "No index to drop");
        return Ok(false);
    }
    std::fs::remove_dir_all(path)?;
    info!(path = ?path, "Dropped index");
    Ok(true)
}

/// Remove a leftover directory, if any.
pub fn remove_if_exists(path: &Path) -> Result<(), VectorError> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// Replace the index at `target` with the finished build at `staging`.
///
/// The old index is moved aside first and restored if the final rename fails.
pub fn promote_staging(staging: &Path, target: &Path) -> Result<(), VectorError> {
    let previous = previous_path(target);
    remove_if_exists(&previous)?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let had_previous = target.exists();
    if had_previous {
        std::fs::rename(target, &previous)?;
    }

    if let Err(e) = std::fs::rename(staging, target) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&previous, target) {
                warn!(error = %restore, path = ?previous, "Failed to restore previous index");
            }
        }
        return Err(VectorError::Io(e));
    }

    if had_previous {
        std::fs::remove_dir_all(&previous)?;
    }
    info!(path = ?target, "Promoted staged index");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VectorStore;
    use crate::store::PersistentIndex;
    use rag_types::{Chunk, ChunkId, ChunkRecord, DistanceMetric};
    use tempfile::TempDir;

    fn populated(root: &Path, text: &str) {
        let mut index = PersistentIndex::create(root, DistanceMetric::Euclidean, "m").unwrap();
        index
            .upsert(ChunkRecord::new(
                ChunkId::generate(),
                Chunk::new("s", 0, text),
                vec![1.0, 0.0],
            ))
            .unwrap();
        index.flush().unwrap();
    }

    #[test]
    fn test_detect_states() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("index");
        assert_eq!(detect_state(&root), IndexState::Absent);

        std::fs::create_dir_all(&root).unwrap();
        assert_eq!(detect_state(&root), IndexState::PresentEmpty);

        populated(&root, "Cats purr.");
        assert_eq!(detect_state(&root), IndexState::PresentNonEmpty);
    }

    #[test]
    fn test_created_but_unwritten_is_empty() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("index");
        PersistentIndex::create(&root, DistanceMetric::Euclidean, "m").unwrap();
        assert_eq!(detect_state(&root), IndexState::PresentEmpty);
    }

    #[test]
    fn test_sibling_paths() {
        let path = Path::new("/data/rag/index");
        assert_eq!(staging_path(path), PathBuf::from("/data/rag/index.staging"));
        assert_eq!(sibling(path, ".lock"), PathBuf::from("/data/rag/index.lock"));
    }

    #[test]
    fn test_drop_index() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("index");
        assert!(!drop_index(&root).unwrap());

        populated(&root, "x");
        assert!(drop_index(&root).unwrap());
        assert_eq!(detect_state(&root), IndexState::Absent);
    }

    #[test]
    fn test_promote_replaces_previous() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("index");
        let staging = staging_path(&root);

        populated(&root, "old");
        populated(&staging, "new");
        promote_staging(&staging, &root).unwrap();

        assert!(!staging.exists());
        assert!(!previous_path(&root).exists());
        let index = PersistentIndex::open_read_only(&root).unwrap();
        let records = index.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "new");
    }

    #[test]
    fn test_promote_into_absent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("index");
        let staging = staging_path(&root);
        std::fs::create_dir_all(staging.parent().unwrap()).unwrap();
        populated(&staging, "new");

        promote_staging(&staging, &root).unwrap();
        assert_eq!(detect_state(&root), IndexState::PresentNonEmpty);
    }
}
