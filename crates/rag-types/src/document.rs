//! Documents, chunks and the records persisted for them.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::RagError;

/// Raw source text plus the identifier of where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source identifier (usually a file path)
    pub source: String,
    /// Full document text
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A contiguous, non-empty span of a document chosen by a chunking strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text (never empty)
    pub text: String,
    /// Source of the parent document
    pub source: String,
    /// Position of this chunk within its document, starting at 0
    pub sequence: usize,
}

impl Chunk {
    pub fn new(source: impl Into<String>, sequence: usize, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            sequence,
        }
    }

    /// Metadata stored alongside this chunk's record.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source.clone(),
            sequence: self.sequence,
        }
    }
}

/// Unique chunk identifier.
///
/// Backed by a ULID: 80 random bits plus a millisecond timestamp, so ids are
/// never derived from content and two builds never hand out the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(Ulid);

impl ChunkId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Big-endian byte form, used as a storage key.
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChunkId {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| RagError::InvalidInput(format!("invalid chunk id '{}': {}", s, e)))
    }
}

/// Metadata persisted with every chunk record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document identifier
    pub source: String,
    /// Sequence index within the source document
    pub sequence: usize,
}

/// A chunk with its identifier and embedding, as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
    /// Creation time (ms since epoch)
    pub created_at: i64,
}

impl ChunkRecord {
    pub fn new(id: ChunkId, chunk: Chunk, vector: Vec<f32>) -> Self {
        let metadata = chunk.metadata();
        Self {
            id,
            text: chunk.text,
            vector,
            metadata,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// Text shortened for log lines and status output.
    pub fn preview(&self) -> String {
        const MAX_PREVIEW: usize = 80;
        match self.text.char_indices().nth(MAX_PREVIEW) {
            Some((idx, _)) => format!("{}...", &self.text[..idx]),
            None => self.text.clone(),
        }
    }
}

/// A ranked hit for one query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: ChunkId,
    pub text: String,
    /// Raw distance reported by the index
    pub distance: f32,
    /// Similarity derived from `distance` by the index's metric
    pub similarity: f32,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_metadata() {
        let chunk = Chunk::new("facts.txt", 3, "Cats purr.");
        let meta = chunk.metadata();
        assert_eq!(meta.source, "facts.txt");
        assert_eq!(meta.sequence, 3);
    }

    #[test]
    fn test_chunk_id_string_roundtrip() {
        let id = ChunkId::generate();
        let parsed: ChunkId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_chunk_id_bytes_roundtrip() {
        let id = ChunkId::generate();
        assert_eq!(ChunkId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_chunk_id_invalid() {
        assert!("not-a-ulid".parse::<ChunkId>().is_err());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: std::collections::HashSet<ChunkId> =
            (0..1000).map(|_| ChunkId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_record_serializes_id_as_string() {
        let record = ChunkRecord::new(
            ChunkId::generate(),
            Chunk::new("facts.txt", 0, "Cats purr."),
            vec![0.5, 0.5],
        );
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["id"].is_string());
        assert_eq!(json["metadata"]["sequence"], 0);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let record = ChunkRecord::new(
            ChunkId::generate(),
            Chunk::new("s", 0, "é".repeat(200)),
            vec![1.0],
        );
        let preview = record.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 83);
    }
}
