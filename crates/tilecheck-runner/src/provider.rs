//! Where tile bytes come from.

use crate::ProviderError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tilecheck_geo::TileAddress;
use tracing::debug;

/// Default number of tiles kept in memory by [`DirectoryTileProvider`].
pub const DEFAULT_CACHE_SIZE: usize = 16;

/// Source of raw (possibly gzip-compressed) tile bytes.
pub trait TileProvider: Send + Sync {
    /// Fetch one tile of a tileset.
    fn fetch(&self, tileset: &str, tile: &TileAddress) -> Result<Arc<Vec<u8>>, ProviderError>;
}

type CacheKey = (String, TileAddress);

/// LRU cache of tile bytes.
struct TileCache {
    tiles: HashMap<CacheKey, Arc<Vec<u8>>>,
    /// Most recently used at the back.
    access_order: Vec<CacheKey>,
    max_size: usize,
}

impl TileCache {
    fn new(max_size: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            access_order: Vec::new(),
            max_size,
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Arc<Vec<u8>>> {
        let bytes = self.tiles.get(key).cloned()?;
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            let key = self.access_order.remove(pos);
            self.access_order.push(key);
        }
        Some(bytes)
    }

    fn insert(&mut self, key: CacheKey, bytes: Arc<Vec<u8>>) {
        if self.max_size == 0 || self.tiles.contains_key(&key) {
            return;
        }
        while self.tiles.len() >= self.max_size && !self.access_order.is_empty() {
            let oldest = self.access_order.remove(0);
            self.tiles.remove(&oldest);
        }
        self.access_order.push(key.clone());
        self.tiles.insert(key, bytes);
    }

    fn len(&self) -> usize {
        self.tiles.len()
    }
}

/// Reads tiles from a local cache directory laid out as
/// `{dir}/{tileset}-{z}-{x}-{y}.mvt`.
///
/// Recently read tiles are kept in memory, so several datasets drawn from the
/// same tileset only touch the disk once per tile.
pub struct DirectoryTileProvider {
    dir: PathBuf,
    cache: Mutex<TileCache>,
}

impl DirectoryTileProvider {
    /// Provider over `dir` with the default cache size.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_cache_size(dir, DEFAULT_CACHE_SIZE)
    }

    /// Provider keeping at most `max_size` tiles in memory (0 disables the
    /// cache).
    pub fn with_cache_size<P: AsRef<Path>>(dir: P, max_size: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: Mutex::new(TileCache::new(max_size)),
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a tile is read from.
    pub fn tile_path(&self, tileset: &str, tile: &TileAddress) -> PathBuf {
        self.dir.join(tile.file_name(tileset))
    }

    /// Number of tiles held in memory.
    pub fn cached_tile_count(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl TileProvider for DirectoryTileProvider {
    fn fetch(&self, tileset: &str, tile: &TileAddress) -> Result<Arc<Vec<u8>>, ProviderError> {
        let key = (tileset.to_string(), *tile);
        {
            let mut cache = self.cache.lock().map_err(|_| ProviderError::CacheLockPoisoned)?;
            if let Some(bytes) = cache.get(&key) {
                debug!("Tile {} of '{}' served from memory", tile, tileset);
                return Ok(bytes);
            }
        }

        let path = self.tile_path(tileset, tile);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => Arc::new(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound { path });
            }
            Err(source) => return Err(ProviderError::Io { path, source }),
        };
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        let mut cache = self.cache.lock().map_err(|_| ProviderError::CacheLockPoisoned)?;
        cache.insert(key, Arc::clone(&bytes));
        Ok(bytes)
    }
}
