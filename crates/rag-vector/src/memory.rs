//! In-memory vector store with exact (brute-force) search.
//!
//! Suitable for tests and small corpora that do not need to survive a
//! restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rag_types::{ChunkId, ChunkRecord, DistanceMetric};

use crate::error::VectorError;
use crate::index::{check_dimension, IndexStats, Neighbor, VectorStore};

#[derive(Debug)]
pub struct InMemoryIndex {
    metric: DistanceMetric,
    dimension: Option<usize>,
    records: HashMap<ChunkId, ChunkRecord>,
    created_at: DateTime<Utc>,
}

impl InMemoryIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimension: None,
            records: HashMap::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

/// Distance between two vectors under `metric`.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
            let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 1.0;
            }
            1.0 - dot / (norm_a * norm_b)
        }
    }
}

impl VectorStore for InMemoryIndex {
    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn upsert(&mut self, record: ChunkRecord) -> Result<(), VectorError> {
        check_dimension(self.dimension, record.vector.len())?;
        self.dimension = Some(record.vector.len());
        self.records.insert(record.id, record);
        Ok(())
    }

    fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        check_dimension(self.dimension, vector.len())?;

        let mut scored: Vec<Neighbor> = self
            .records
            .values()
            .map(|record| Neighbor {
                id: record.id,
                distance: distance(self.metric, &record.vector, vector),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn records(&self) -> Result<Vec<ChunkRecord>, VectorError> {
        Ok(self.records.values().cloned().collect())
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            record_count: self.records.len(),
            dimension: self.dimension,
            metric: self.metric,
            embedding_model: String::new(),
            size_bytes: 0,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_types::Chunk;

    fn record(text: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord::new(ChunkId::generate(), Chunk::new("s", 0, text), vector)
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let mut index = InMemoryIndex::new(DistanceMetric::Euclidean);
        index.upsert(record("far", vec![10.0, 10.0])).unwrap();
        index.upsert(record("near", vec![1.0, 1.0])).unwrap();
        index.upsert(record("mid", vec![4.0, 4.0])).unwrap();

        let hits = index.nearest(&[0.0, 0.0], 2).unwrap();
        let texts: Vec<_> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid"]);
    }

    #[test]
    fn test_cosine_metric() {
        let mut index = InMemoryIndex::new(DistanceMetric::Cosine);
        index.upsert(record("same", vec![2.0, 0.0])).unwrap();
        let hits = index.nearest(&[1.0, 0.0], 1).unwrap();
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_empty() {
        let index = InMemoryIndex::default();
        assert!(index.nearest(&[1.0], 4).unwrap().is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_dimension_locked_by_first_record() {
        let mut index = InMemoryIndex::default();
        index.upsert(record("a", vec![1.0, 0.0])).unwrap();
        assert!(matches!(
            index.upsert(record("b", vec![1.0])),
            Err(VectorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_distance_helper() {
        assert!((distance(DistanceMetric::Euclidean, &[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(distance(DistanceMetric::Cosine, &[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }
}
