//! Persisted index: manifest + HNSW graph + record store.
//!
//! Layout under the index directory:
//! - `manifest.json` - metric, dimension, embedding model, record count
//! - `vectors.usearch` - HNSW graph
//! - `records/` - RocksDB record store

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rag_types::{ChunkRecord, DistanceMetric};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::VectorError;
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::index::{check_dimension, IndexStats, Neighbor, VectorStore};
use crate::metadata::{RecordStore, StoredRecord};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.usearch";
pub const RECORDS_DIR: &str = "records";

/// Current manifest format version
const MANIFEST_VERSION: u32 = 1;

/// Description of a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub version: u32,
    pub metric: DistanceMetric,
    /// Unknown until the first record is written
    pub dimension: Option<usize>,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
}

impl IndexManifest {
    pub fn new(metric: DistanceMetric, embedding_model: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            metric,
            dimension: None,
            embedding_model: embedding_model.into(),
            created_at: Utc::now(),
            record_count: 0,
        }
    }

    /// Read `manifest.json` from an index directory.
    pub fn load(dir: &Path) -> Result<Self, VectorError> {
        let file = dir.join(MANIFEST_FILE);
        let bytes = std::fs::read(&file).map_err(|e| {
            VectorError::unavailable(dir, format!("cannot read manifest ({}); run `rag build` first", e))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VectorError::unavailable(dir, format!("corrupt manifest: {}", e)))
    }

    fn save(&self, dir: &Path) -> Result<(), VectorError> {
        let tmp = dir.join(format!("{}.tmp", MANIFEST_FILE));
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, dir.join(MANIFEST_FILE))?;
        Ok(())
    }
}

/// Vector store persisted on disk.
pub struct PersistentIndex {
    root: PathBuf,
    manifest: IndexManifest,
    graph: Option<HnswIndex>,
    records: RecordStore,
    next_key: u64,
    read_only: bool,
}

impl PersistentIndex {
    /// Create a new, empty index at `root`.
    pub fn create(
        root: impl Into<PathBuf>,
        metric: DistanceMetric,
        embedding_model: impl Into<String>,
    ) -> Result<Self, VectorError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let manifest = IndexManifest::new(metric, embedding_model);
        let records = RecordStore::open(root.join(RECORDS_DIR))?;
        manifest.save(&root)?;

        info!(path = ?root, metric = %metric, "Created index");
        Ok(Self {
            root,
            manifest,
            graph: None,
            records,
            next_key: 0,
            read_only: false,
        })
    }

    /// Open an existing index for writing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, VectorError> {
        Self::open_inner(root.into(), false)
    }

    /// Open an existing index for queries only.
    pub fn open_read_only(root: impl Into<PathBuf>) -> Result<Self, VectorError> {
        Self::open_inner(root.into(), true)
    }

    fn open_inner(root: PathBuf, read_only: bool) -> Result<Self, VectorError> {
        let manifest = IndexManifest::load(&root)?;
        let records_dir = root.join(RECORDS_DIR);
        let records = if read_only {
            RecordStore::open_read_only(&records_dir)?
        } else {
            RecordStore::open(&records_dir)?
        };

        let vectors_file = root.join(VECTORS_FILE);
        let graph = match manifest.dimension {
            Some(dim) if vectors_file.exists() => Some(HnswIndex::load(
                HnswConfig::new(dim, manifest.metric).with_capacity(manifest.record_count),
                &vectors_file,
            )?),
            Some(_) if manifest.record_count > 0 => {
                return Err(VectorError::unavailable(
                    &root,
                    "vector file missing; run `rag build --force`",
                ))
            }
            _ => None,
        };

        let next_key = records.next_key()?;
        info!(
            path = ?root,
            records = manifest.record_count,
            metric = %manifest.metric,
            read_only,
            "Opened index"
        );

        Ok(Self {
            root,
            manifest,
            graph,
            records,
            next_key,
            read_only,
        })
    }

    /// Open and require a specific metric.
    pub fn open_with_metric(
        root: impl Into<PathBuf>,
        metric: DistanceMetric,
        read_only: bool,
    ) -> Result<Self, VectorError> {
        let index = Self::open_inner(root.into(), read_only)?;
        if index.manifest.metric != metric {
            return Err(VectorError::MetricMismatch {
                path: index.root.clone(),
                stored: index.manifest.metric,
                requested: metric,
            });
        }
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    fn writable(&self) -> Result<(), VectorError> {
        if self.read_only {
            return Err(VectorError::unavailable(&self.root, "index opened read-only"));
        }
        Ok(())
    }

    fn graph_for(&mut self, dimension: usize) -> Result<&mut HnswIndex, VectorError> {
        check_dimension(self.manifest.dimension, dimension)?;
        if self.graph.is_none() {
            self.graph = Some(HnswIndex::create(HnswConfig::new(
                dimension,
                self.manifest.metric,
            ))?);
            self.manifest.dimension = Some(dimension);
        }
        self.graph
            .as_mut()
            .ok_or_else(|| VectorError::Index("graph not initialized".to_string()))
    }
}

impl VectorStore for PersistentIndex {
    fn metric(&self) -> DistanceMetric {
        self.manifest.metric
    }

    fn dimension(&self) -> Option<usize> {
        self.manifest.dimension
    }

    fn len(&self) -> usize {
        self.manifest.record_count
    }

    fn upsert(&mut self, record: ChunkRecord) -> Result<(), VectorError> {
        self.writable()?;

        let existing = self.records.get(record.id)?;
        let key = match &existing {
            Some(stored) => stored.key,
            None => self.next_key,
        };

        let graph = self.graph_for(record.vector.len())?;
        if existing.is_some() {
            graph.remove(key)?;
        }
        graph.add(key, &record.vector)?;

        self.records.put(&StoredRecord { key, record })?;
        if existing.is_none() {
            self.next_key += 1;
            self.manifest.record_count += 1;
        }
        Ok(())
    }

    fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        check_dimension(self.manifest.dimension, vector.len())?;
        let graph = match &self.graph {
            Some(graph) => graph,
            None => return Ok(Vec::new()),
        };

        let mut neighbors = Vec::new();
        for (key, distance) in graph.search(vector, k)? {
            match self.records.get_by_key(key)? {
                Some(stored) => neighbors.push(Neighbor {
                    id: stored.record.id,
                    distance,
                    text: stored.record.text,
                    metadata: stored.record.metadata,
                }),
                None => warn!(key, path = ?self.root, "Vector without record, skipping"),
            }
        }
        debug!(k, found = neighbors.len(), "Nearest query complete");
        Ok(neighbors)
    }

    fn records(&self) -> Result<Vec<ChunkRecord>, VectorError> {
        Ok(self.records.all()?.into_iter().map(|s| s.record).collect())
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            record_count: self.manifest.record_count,
            dimension: self.manifest.dimension,
            metric: self.manifest.metric,
            embedding_model: self.manifest.embedding_model.clone(),
            size_bytes: dir_size(&self.root),
            created_at: self.manifest.created_at,
        }
    }

    fn flush(&mut self) -> Result<(), VectorError> {
        self.writable()?;
        if let Some(graph) = &self.graph {
            graph.save(&self.root.join(VECTORS_FILE))?;
        }
        self.records.flush()?;
        self.manifest.save(&self.root)?;
        debug!(path = ?self.root, records = self.manifest.record_count, "Flushed index");
        Ok(())
    }
}

/// Total size of regular files under `dir`.
pub fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => dir_size(&entry.path()),
            Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}
