//! Distance metrics and the distance-to-similarity conversion.
//!
//! An index is built with exactly one metric and records it in its manifest.
//! Similarities are only comparable within one metric.

use serde::{Deserialize, Serialize};

/// Vector distance metric used by an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// L2 distance. `similarity = 1 / (1 + d)`, bounded in (0, 1].
    #[default]
    Euclidean,
    /// Cosine distance `d = 1 - cos`. `similarity = 1 - d`, clamped to [-1, 1].
    Cosine,
}

impl DistanceMetric {
    /// Convert a raw distance into a similarity score (higher is closer).
    ///
    /// Monotonically non-increasing in `distance` for both metrics. Negative
    /// Euclidean distances (float noise) are treated as 0.
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
            DistanceMetric::Cosine => (1.0 - distance).clamp(-1.0, 1.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
