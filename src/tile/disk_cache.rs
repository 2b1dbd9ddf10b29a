//! Directory-backed tile cache.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   manifest.json          layout version and image geometry
//!   <level>/<row>/<column>.tile
//! ```
//!
//! A manifest that does not match the current layout version or the opening
//! reader's geometry causes the whole directory to be wiped and recreated.
//!
//! Each tile file is a small header followed by raw pixels:
//!
//! | Offset | Size | Field         |
//! |--------|------|---------------|
//! | 0      | 4    | magic `TCTL`  |
//! | 4      | 4    | width (LE)    |
//! | 8      | 4    | height (LE)   |
//! | 12     | 8    | version (LE)  |
//! | 20     | 4    | payload bytes |
//! | 24     | ...  | pixels        |

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CacheError;
use crate::reader::TileGeometry;

use super::adapter::{
    read_tile_parts, CacheReadCallback, TileCache, TileCacheOpener, TileKey, TileSource,
};

/// Current on-disk layout version.
pub const CACHE_LAYOUT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const TILE_MAGIC: &[u8; 4] = b"TCTL";
const HEADER_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Manifest {
    layout_version: u32,
    width: u64,
    height: u64,
    tile_width: u32,
    tile_height: u32,
}

impl Manifest {
    fn for_geometry(geometry: &TileGeometry) -> Self {
        Self {
            layout_version: CACHE_LAYOUT_VERSION,
            width: geometry.native_width(),
            height: geometry.native_height(),
            tile_width: geometry.tile_width(),
            tile_height: geometry.tile_height(),
        }
    }
}

// =============================================================================
// Disk Tile Cache
// =============================================================================

/// Tile cache persisted under a directory.
pub struct DiskTileCache {
    root: PathBuf,
}

impl DiskTileCache {
    /// Open (or create) the cache rooted at `root` for an image of `geometry`.
    pub fn open(root: impl AsRef<Path>, geometry: &TileGeometry) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        let open_err = |e: std::io::Error| CacheError::Open {
            uri: root.display().to_string(),
            reason: e.to_string(),
        };

        let expected = Manifest::for_geometry(geometry);
        let manifest_path = root.join(MANIFEST_FILE);

        let current = match fs::read(&manifest_path) {
            Ok(raw) => serde_json::from_slice::<Manifest>(&raw).ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(open_err(e)),
        };

        if current.as_ref() != Some(&expected) {
            if root.exists() {
                info!(path = %root.display(), "Tile cache layout changed, clearing");
                fs::remove_dir_all(&root).map_err(open_err)?;
            }
            fs::create_dir_all(&root).map_err(open_err)?;

            let raw = serde_json::to_vec_pretty(&expected).map_err(|e| CacheError::Open {
                uri: root.display().to_string(),
                reason: e.to_string(),
            })?;
            fs::write(&manifest_path, raw).map_err(open_err)?;
        }

        debug!(path = %root.display(), "Opened tile cache");
        Ok(Self { root })
    }

    /// Opener treating the reader's cache URI as a directory path.
    pub fn opener() -> TileCacheOpener {
        Arc::new(|uri: &str, geometry: &TileGeometry| -> Result<Box<dyn TileCache>, CacheError> {
            Ok(Box::new(DiskTileCache::open(uri, geometry)?) as Box<dyn TileCache>)
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tile_path(&self, key: TileKey) -> PathBuf {
        self.root
            .join(key.level.to_string())
            .join(key.row.to_string())
            .join(format!("{}.tile", key.column))
    }

    /// Whether a tile file exists for `key`.
    pub fn contains(&self, key: TileKey) -> bool {
        self.tile_path(key).is_file()
    }

    fn load(&self, key: TileKey) -> Result<Option<StoredTile>, CacheError> {
        match fs::read(self.tile_path(key)) {
            Ok(raw) => decode_tile(&raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: TileKey, tile: &StoredTile) -> Result<(), CacheError> {
        let path = self.tile_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // write-then-rename so readers never see a torn tile
        let tmp = path.with_extension("tile.tmp");
        fs::write(&tmp, encode_tile(tile))?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl TileCache for DiskTileCache {
    fn get_tile(
        &mut self,
        key: TileKey,
        source: &mut dyn TileSource,
        callback: &mut dyn CacheReadCallback,
    ) -> Result<bool, CacheError> {
        let version = source.tile_version(key);
        let (width, height) = key.size(source.geometry());

        if let Some(tile) = self.load(key)? {
            let fresh = tile.version == version && tile.width == width && tile.height == height;
            if fresh {
                if callback.canceled() {
                    return Ok(false);
                }
                callback.update(0, 0, width, height, &tile.data);
                return Ok(true);
            }
        }

        match read_tile_parts(key, source, callback)? {
            Some(data) => {
                self.store(
                    key,
                    &StoredTile {
                        width,
                        height,
                        version,
                        data,
                    },
                )?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Tile File Codec
// =============================================================================

struct StoredTile {
    width: u32,
    height: u32,
    version: u64,
    data: Vec<u8>,
}

fn encode_tile(tile: &StoredTile) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + tile.data.len());
    buf.put_slice(TILE_MAGIC);
    buf.put_u32_le(tile.width);
    buf.put_u32_le(tile.height);
    buf.put_u64_le(tile.version);
    buf.put_u32_le(tile.data.len() as u32);
    buf.put_slice(&tile.data);
    buf.to_vec()
}

fn decode_tile(raw: &[u8]) -> Result<StoredTile, CacheError> {
    if raw.len() < HEADER_LEN || &raw[..4] != TILE_MAGIC {
        return Err(CacheError::Corrupt("bad tile header".to_string()));
    }

    let mut header = &raw[4..HEADER_LEN];
    let width = header.get_u32_le();
    let height = header.get_u32_le();
    let version = header.get_u64_le();
    let len = header.get_u32_le() as usize;

    let payload = &raw[HEADER_LEN..];
    if payload.len() != len {
        return Err(CacheError::Corrupt(format!(
            "tile payload is {} bytes, header says {len}",
            payload.len()
        )));
    }

    Ok(StoredTile {
        width,
        height,
        version,
        data: payload.to_vec(),
    })
}
