//! HNSW graph over chunk vectors, backed by usearch.
//!
//! Keys are dense u64 values handed out by the record store; the mapping to
//! chunk ids lives in RocksDB, not here.
//!
//! Parameters favour recall over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200
//! - ef_search = 100

use std::path::Path;

use rag_types::DistanceMetric;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;

/// Smallest reservation made when the graph grows.
const MIN_RESERVE: usize = 64;

/// HNSW configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Vector length (fixed by the embedding model)
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// Connections per layer (M)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Initial reservation
    pub capacity: usize,
}

impl HnswConfig {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            capacity: 1024,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: match self.metric {
                DistanceMetric::Euclidean => MetricKind::L2sq,
                DistanceMetric::Cosine => MetricKind::Cos,
            },
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

/// HNSW index wrapper around usearch.
///
/// usearch synchronizes internally, so reads need no extra lock.
pub struct HnswIndex {
    index: Index,
    config: HnswConfig,
}

impl HnswIndex {
    /// Create an empty graph.
    pub fn create(config: HnswConfig) -> Result<Self, VectorError> {
        let index = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .reserve(config.capacity.max(MIN_RESERVE))
            .map_err(|e| VectorError::Index(e.to_string()))?;
        debug!(dim = config.dimension, metric = %config.metric, "Created HNSW graph");
        Ok(Self { index, config })
    }

    /// Load a graph saved with [`HnswIndex::save`].
    pub fn load(config: HnswConfig, file: &Path) -> Result<Self, VectorError> {
        let index = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .load(path_str(file)?)
            .map_err(|e| VectorError::unavailable(file, format!("failed to load vectors: {}", e)))?;

        if index.dimensions() != config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: config.dimension,
                actual: index.dimensions(),
            });
        }

        info!(path = ?file, vectors = index.size(), "Loaded HNSW graph");
        Ok(Self { index, config })
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: u64) -> bool {
        self.index.contains(key)
    }

    /// Add a vector under `key`, growing the reservation when full.
    pub fn add(&mut self, key: u64, vector: &[f32]) -> Result<(), VectorError> {
        self.check(vector)?;

        if self.index.size() + 1 > self.index.capacity() {
            let grown = (self.index.capacity() * 2).max(MIN_RESERVE);
            self.index
                .reserve(grown)
                .map_err(|e| VectorError::Index(e.to_string()))?;
            debug!(capacity = grown, "Grew HNSW reservation");
        }

        self.index
            .add(key, vector)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(())
    }

    pub fn remove(&mut self, key: u64) -> Result<bool, VectorError> {
        let removed = self
            .index
            .remove(key)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(removed > 0)
    }

    /// Up to `k` (key, distance) pairs, closest first.
    ///
    /// Distances are true L2 for Euclidean (usearch reports squared L2) and
    /// `1 - cos` for Cosine.
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(u64, f32)>, VectorError> {
        self.check(vector)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .index
            .search(vector, k)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let metric = self.config.metric;
        Ok(matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .map(|(&key, &raw)| {
                let distance = match metric {
                    DistanceMetric::Euclidean => raw.max(0.0).sqrt(),
                    DistanceMetric::Cosine => raw,
                };
                (key, distance)
            })
            .collect())
    }

    pub fn save(&self, file: &Path) -> Result<(), VectorError> {
        self.index
            .save(path_str(file)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;
        info!(path = ?file, vectors = self.index.size(), "Saved HNSW graph");
        Ok(())
    }

    fn check(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn path_str(path: &Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index(format!("Invalid path encoding: {:?}", path)))
}
