//! Persistent query cache and archive asset handling
//!
//! Maps a canonical query descriptor to a previously resolved tile set so
//! repeated runs skip the catalog entirely. Entries are stored with asset
//! references relative to the archive root, which keeps the cache portable
//! across machines; lookups rewrite them back to absolute, locally
//! resolvable paths.
//!
//! Entries never expire automatically. A forced refresh bypasses lookup,
//! queries the catalog again, and overwrites the existing entry.

mod key;
mod store;

pub use key::QueryKey;
pub use store::{DiskStore, KvStore, StoreError};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::catalog::{CandidateTile, CatalogError, HttpClient};

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying key-value store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A cached entry could not be decoded.
    #[error("Corrupt cache entry: {0}")]
    Decode(String),

    /// A tile set could not be encoded for storage.
    #[error("Failed to encode cache entry: {0}")]
    Encode(String),
}

/// Errors that can occur while materializing remote assets locally.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Download failure.
    #[error(transparent)]
    Http(#[from] CatalogError),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The href had no path component to derive an archive location from.
    #[error("Unusable asset href: {0}")]
    BadHref(String),
}

/// Strips the scheme and host from a remote href, leaving the path suffix
/// used as the asset's location relative to the archive root.
fn href_relative_path(href: &str) -> Option<PathBuf> {
    if href.starts_with("http://") || href.starts_with("https://") {
        let suffix: Vec<&str> = href.split('/').skip(3).filter(|s| !s.is_empty()).collect();
        if suffix.is_empty() {
            return None;
        }
        return Some(suffix.iter().collect());
    }
    None
}

/// Persistent cache of resolved tile sets, keyed by [`QueryKey`].
pub struct QueryCache {
    store: Box<dyn KvStore>,
    archive_root: PathBuf,
}

impl QueryCache {
    /// Creates a cache over `store`, resolving relative asset paths against
    /// `archive_root`.
    pub fn new(store: Box<dyn KvStore>, archive_root: impl AsRef<Path>) -> Self {
        Self {
            store,
            archive_root: archive_root.as_ref().to_path_buf(),
        }
    }

    /// Opens a disk-backed cache inside the archive directory itself.
    pub fn open(archive_root: impl AsRef<Path>) -> Result<Self, CacheError> {
        let store = DiskStore::open(archive_root.as_ref().join("stac_queries"))?;
        Ok(Self::new(Box::new(store), archive_root))
    }

    /// Returns the cached tile set for `key`, with asset paths rewritten to
    /// absolute form, or `None` on a miss.
    pub fn lookup(&self, key: &QueryKey) -> Result<Option<Vec<CandidateTile>>, CacheError> {
        let Some(bytes) = self.store.get(&key.canonical())? else {
            return Ok(None);
        };
        let mut tiles: Vec<CandidateTile> = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Decode(e.to_string()))?;
        for tile in &mut tiles {
            for href in tile.assets.values_mut() {
                *href = self
                    .archive_root
                    .join(href.as_str())
                    .to_string_lossy()
                    .into_owned();
            }
        }
        debug!(tiles = tiles.len(), "Query cache hit");
        Ok(Some(tiles))
    }

    /// Stores `tiles` under `key`, rewriting asset paths to be relative to
    /// the archive root. Overwrites any existing entry.
    pub fn store(&self, key: &QueryKey, tiles: &[CandidateTile]) -> Result<(), CacheError> {
        let mut portable = tiles.to_vec();
        for tile in &mut portable {
            for href in tile.assets.values_mut() {
                if let Ok(relative) = Path::new(href.as_str()).strip_prefix(&self.archive_root) {
                    *href = relative.to_string_lossy().into_owned();
                }
            }
        }
        let bytes =
            serde_json::to_vec(&portable).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.store.put(&key.canonical(), &bytes)?;
        Ok(())
    }

    /// Returns true if an entry exists for `key`.
    pub fn contains(&self, key: &QueryKey) -> Result<bool, CacheError> {
        Ok(self.store.contains(&key.canonical())?)
    }
}

/// Downloads remote assets into the archive directory, skipping files that
/// already exist locally.
pub struct ArchiveFetcher {
    root: PathBuf,
}

impl ArchiveFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Ensures the asset behind `href` exists under the archive root and
    /// returns its path relative to the root.
    pub fn ensure_local(
        &self,
        http: &dyn HttpClient,
        href: &str,
    ) -> Result<PathBuf, FetchError> {
        let relative =
            href_relative_path(href).ok_or_else(|| FetchError::BadHref(href.to_string()))?;
        let absolute = self.root.join(&relative);

        if !absolute.exists() {
            debug!(href, "Downloading asset");
            if let Some(parent) = absolute.parent() {
                fs::create_dir_all(parent)?;
            }
            let bytes = http.get(href)?;
            // Write-then-rename so a crashed download is never mistaken for
            // a complete asset.
            let tmp = absolute.with_extension("part");
            fs::write(&tmp, &bytes)?;
            fs::rename(&tmp, &absolute)?;
        }

        Ok(relative)
    }
}
