//! Chunk record storage.
//!
//! Records live in RocksDB next to the HNSW graph:
//! - `chunk_records`: ChunkId bytes -> JSON [`StoredRecord`]
//! - `vector_keys`: u64 graph key (big-endian) -> ChunkId bytes

use std::path::Path;

use rag_types::{ChunkId, ChunkRecord};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VectorError;

/// Column family holding chunk records
pub const CF_CHUNK_RECORDS: &str = "chunk_records";

/// Column family mapping graph keys to chunk ids
pub const CF_VECTOR_KEYS: &str = "vector_keys";

/// A chunk record plus the graph key its vector is stored under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: u64,
    pub record: ChunkRecord,
}

/// Record storage using RocksDB.
pub struct RecordStore {
    db: DB,
}

impl RecordStore {
    fn descriptors() -> Vec<ColumnFamilyDescriptor> {
        vec![
            ColumnFamilyDescriptor::new(CF_CHUNK_RECORDS, Options::default()),
            ColumnFamilyDescriptor::new(CF_VECTOR_KEYS, Options::default()),
        ]
    }

    /// Open or create a writable store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&opts, path, Self::descriptors())?;

        info!(path = ?path, "Opened record store");
        Ok(Self { db })
    }

    /// Open an existing store for queries. Several readers may share a path.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();
        let opts = Options::default();
        let db = DB::open_cf_for_read_only(&opts, path, [CF_CHUNK_RECORDS, CF_VECTOR_KEYS], false)
            .map_err(|e| VectorError::unavailable(path, e.to_string()))?;
        debug!(path = ?path, "Opened record store read-only");
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| VectorError::Index(format!("column family {} missing", name)))
    }

    /// Store a record and its key mapping atomically.
    pub fn put(&self, stored: &StoredRecord) -> Result<(), VectorError> {
        let id = stored.record.id.to_bytes();
        let value = serde_json::to_vec(stored)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_CHUNK_RECORDS)?, id, value);
        batch.put_cf(self.cf(CF_VECTOR_KEYS)?, stored.key.to_be_bytes(), id);
        self.db.write(batch)?;

        debug!(id = %stored.record.id, key = stored.key, "Stored record");
        Ok(())
    }

    pub fn get(&self, id: ChunkId) -> Result<Option<StoredRecord>, VectorError> {
        match self.db.get_cf(self.cf(CF_CHUNK_RECORDS)?, id.to_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Chunk id stored under a graph key.
    pub fn id_for_key(&self, key: u64) -> Result<Option<ChunkId>, VectorError> {
        match self.db.get_cf(self.cf(CF_VECTOR_KEYS)?, key.to_be_bytes())? {
            Some(bytes) => {
                let raw: [u8; 16] = bytes.as_slice().try_into().map_err(|_| {
                    VectorError::Index(format!("corrupt chunk id under key {}", key))
                })?;
                Ok(Some(ChunkId::from_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Record stored under a graph key.
    pub fn get_by_key(&self, key: u64) -> Result<Option<StoredRecord>, VectorError> {
        match self.id_for_key(key)? {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize, VectorError> {
        let iter = self
            .db
            .iterator_cf(self.cf(CF_CHUNK_RECORDS)?, IteratorMode::Start);
        Ok(iter.count())
    }

    /// Every stored record. Use with caution on large indexes.
    pub fn all(&self) -> Result<Vec<StoredRecord>, VectorError> {
        let mut records = Vec::new();
        for item in self
            .db
            .iterator_cf(self.cf(CF_CHUNK_RECORDS)?, IteratorMode::Start)
        {
            let (_, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    /// Next unused graph key.
    pub fn next_key(&self) -> Result<u64, VectorError> {
        let mut iter = self
            .db
            .iterator_cf(self.cf(CF_VECTOR_KEYS)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let raw: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| VectorError::Index("corrupt vector key".to_string()))?;
                Ok(u64::from_be_bytes(raw) + 1)
            }
            None => Ok(0),
        }
    }

    pub fn flush(&self) -> Result<(), VectorError> {
        self.db.flush_cf(self.cf(CF_CHUNK_RECORDS)?)?;
        self.db.flush_cf(self.cf(CF_VECTOR_KEYS)?)?;
        Ok(())
    }
}
