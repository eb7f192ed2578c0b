//! Key-value store interface and disk-backed implementation
//!
//! The cache is domain-agnostic at this layer: string keys, raw byte
//! values. Keys are hashed to filenames so arbitrary query strings (which
//! embed newlines and slashes) stay filesystem-safe.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading or writing an entry.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Generic key-value interface for persisted query results.
///
/// Concurrent readers are safe. Writers must not interleave writes to the
/// same key from multiple processes; single-writer-per-key discipline is an
/// invariant the caller upholds by partitioning work.
pub trait KvStore: Send + Sync {
    /// Returns the stored value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, overwriting any existing entry.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Returns true if an entry exists for `key`.
    fn contains(&self, key: &str) -> Result<bool, StoreError>;
}

/// Disk-backed store: one file per key under a fixed directory, named by
/// the SHA-256 of the key. Entries never expire; they are only overwritten.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2 + 5);
        for byte in digest {
            name.push_str(&format!("{byte:02x}"));
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

impl KvStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        // Write-then-rename keeps concurrent readers from observing a
        // partially written entry.
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entry_path(key).exists())
    }
}
