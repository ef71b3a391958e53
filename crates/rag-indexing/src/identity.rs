//! Chunk identity assignment.
//!
//! Identifiers are random (ULID: 80 random bits + ms timestamp), assigned
//! once when a chunk is created and never derived from content. Two chunks
//! with identical text therefore get different ids.

use std::collections::HashSet;

use rag_types::{Chunk, ChunkId};
use tracing::trace;

use crate::error::IndexingError;

/// Source of fresh identifiers.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> ChunkId;
}

/// Random ULID identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidSource;

impl IdSource for UlidSource {
    fn next_id(&self) -> ChunkId {
        ChunkId::generate()
    }
}

/// Hands out identifiers for one build and refuses duplicates.
///
/// Ids of records carried over from a previous build (incremental mode) are
/// reserved first so a fresh id can never shadow one of them.
pub struct IdentityAssigner {
    source: Box<dyn IdSource>,
    issued: HashSet<ChunkId>,
}

impl IdentityAssigner {
    pub fn new() -> Self {
        Self::with_source(Box::new(UlidSource))
    }

    pub fn with_source(source: Box<dyn IdSource>) -> Self {
        Self {
            source,
            issued: HashSet::new(),
        }
    }

    /// Mark existing ids as taken.
    pub fn reserve(&mut self, ids: impl IntoIterator<Item = ChunkId>) {
        self.issued.extend(ids);
    }

    /// Assign an identifier to `chunk`.
    pub fn assign(&mut self, chunk: &Chunk) -> Result<ChunkId, IndexingError> {
        let id = self.source.next_id();
        if !self.issued.insert(id) {
            return Err(IndexingError::DuplicateIdentifier(id));
        }
        trace!(id = %id, source = %chunk.source, sequence = chunk.sequence, "Assigned chunk id");
        Ok(id)
    }

    /// Assign identifiers to every chunk, in order.
    pub fn assign_all(
        &mut self,
        chunks: Vec<Chunk>,
    ) -> Result<Vec<(ChunkId, Chunk)>, IndexingError> {
        chunks
            .into_iter()
            .map(|chunk| Ok((self.assign(&chunk)?, chunk)))
            .collect()
    }

    /// Number of ids issued or reserved.
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

impl Default for IdentityAssigner {
    fn default() -> Self {
        Self::new()
    }
}
