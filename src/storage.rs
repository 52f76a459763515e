//! Durable storage layer using RocksDB

use rocksdb::{DBCompressionType, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

use crate::config::{CompressionType, StorageConfig};
use crate::errors::StoreError;

/// Thin RocksDB wrapper; every multi-key mutation goes through one `WriteBatch`
#[derive(Clone)]
pub struct DurableStorage {
    db: Arc<DB>,
}

impl DurableStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open(path, &StorageConfig::default())
    }

    pub fn new_with_config(config: &StorageConfig) -> Result<Self, StoreError> {
        Self::open(&config.data_directory, config)
    }

    fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_compression_type(match config.compression_type {
            CompressionType::None => DBCompressionType::None,
            CompressionType::Snappy => DBCompressionType::Snappy,
            CompressionType::Lz4 => DBCompressionType::Lz4,
            CompressionType::Zstd => DBCompressionType::Zstd,
        });

        let db = DB::open(&opts, path)
            .map_err(|e| StoreError::DatabaseOpenFailed(e.into_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key)
            .map_err(|e| StoreError::ReadFailed(e.into_string()))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.put(key, value).map_err(StoreError::from)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db.delete(key).map_err(StoreError::from)
    }

    /// Apply all puts and deletes atomically
    pub fn batch_write<K, V>(&self, puts: &[(K, V)], deletes: &[K]) -> Result<(), StoreError>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::default();
        for (key, value) in puts {
            batch.put(key, value);
        }
        for key in deletes {
            batch.delete(key);
        }
        self.db.write(batch).map_err(StoreError::from)
    }

    /// All key/value pairs whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut entries = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StoreError::ReadFailed(e.into_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn batch_write_applies_puts_and_deletes() {
        let dir = TempDir::new().unwrap();
        let storage = DurableStorage::new(dir.path()).unwrap();
        storage.put(b"stale", b"x").unwrap();

        storage
            .batch_write(&[(b"a".to_vec(), b"1".to_vec())], &[b"stale".to_vec()])
            .unwrap();

        assert_eq!(storage.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get(b"stale").unwrap(), None);
    }

    #[test]
    fn scan_prefix_stops_at_boundary() {
        let dir = TempDir::new().unwrap();
        let storage = DurableStorage::new(dir.path()).unwrap();
        storage.put(b"user:1", b"a").unwrap();
        storage.put(b"user:2", b"b").unwrap();
        storage.put(b"zebra", b"c").unwrap();

        let found = storage.scan_prefix(b"user:").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, b"user:1".to_vec());
    }
}
