//! In-memory tile cache.
//!
//! This module provides an LRU [`TileCache`] that keeps decoded tiles in
//! memory, bounded by total size in bytes.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;

use crate::error::CacheError;
use crate::reader::TileGeometry;

use super::adapter::{read_tile_parts, CacheReadCallback, TileCache, TileCacheOpener, TileKey, TileSource};

/// Default cache capacity: 64MB
pub const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

struct CachedTile {
    version: u64,
    width: u32,
    height: u32,
    data: Bytes,
}

// =============================================================================
// Memory Tile Cache
// =============================================================================

/// LRU cache of decoded tiles for one reader.
///
/// Entries remember the tile version they were decoded at; a lookup for a
/// different version is treated as a miss.
pub struct MemoryTileCache {
    /// The underlying LRU cache
    cache: LruCache<TileKey, CachedTile>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: usize,

    hits: u64,
    misses: u64,
}

impl MemoryTileCache {
    /// Create a cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes of tiles.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            cache: LruCache::new(DEFAULT_MAX_ENTRIES),
            max_size,
            current_size: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Opener producing a fresh cache per reader; the URI is ignored.
    pub fn opener(max_size: usize) -> TileCacheOpener {
        Arc::new(move |_uri: &str, _geometry: &TileGeometry| -> Result<Box<dyn TileCache>, CacheError> {
            Ok(Box::new(MemoryTileCache::with_capacity(max_size)) as Box<dyn TileCache>)
        })
    }

    /// Store a tile, evicting least-recently-used entries as needed.
    fn put(&mut self, key: TileKey, tile: CachedTile) {
        let size = tile.data.len();

        // either the replaced entry for `key` or one evicted by entry count
        if let Some((_, old)) = self.cache.push(key, tile) {
            self.current_size = self.current_size.saturating_sub(old.data.len());
        }
        self.current_size += size;

        while self.current_size > self.max_size {
            match self.cache.pop_lru() {
                Some((_, evicted)) => {
                    self.current_size = self.current_size.saturating_sub(evicted.data.len());
                }
                None => break,
            }
        }
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Total size of cached tiles in bytes.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Lookups served from memory.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to decode.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for MemoryTileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileCache for MemoryTileCache {
    fn get_tile(
        &mut self,
        key: TileKey,
        source: &mut dyn TileSource,
        callback: &mut dyn CacheReadCallback,
    ) -> Result<bool, CacheError> {
        let version = source.tile_version(key);

        if let Some(tile) = self.cache.get(&key) {
            if tile.version == version {
                self.hits += 1;
                if callback.canceled() {
                    return Ok(false);
                }
                callback.update(0, 0, tile.width, tile.height, &tile.data);
                return Ok(true);
            }
        }

        self.misses += 1;
        let (width, height) = key.size(source.geometry());
        match read_tile_parts(key, source, callback)? {
            Some(data) => {
                self.put(
                    key,
                    CachedTile {
                        version,
                        width,
                        height,
                        data: Bytes::from(data),
                    },
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) {
        self.cache.clear();
        self.current_size = 0;
    }
}
