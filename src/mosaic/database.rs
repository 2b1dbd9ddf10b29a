//! JSON-persisted mosaic catalog.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   index.json        one entry per frame type: store file, bounds, GSD range,
//!                     optional coverage geometry
//!   <type>.json       frames of that type
//! ```
//!
//! The entry typed [`AGGREGATE_COVERAGE_TYPE`] carries no store and, when
//! present, is the coverage of the whole catalog. Without it the catalog
//! coverage is the union rectangle of all per-type coverages.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CatalogError;

use super::cursor::MosaicCursor;
use super::frame::Frame;
use super::geometry::{Envelope, Geometry};
use super::query::QueryParameters;

/// Reserved index type holding the catalog-wide coverage.
pub const AGGREGATE_COVERAGE_TYPE: &str = "__aggregate__";

const INDEX_FILE: &str = "index.json";

/// Spatial and resolution extent of a set of frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub geometry: Geometry,
    /// Coarsest GSD shared by the frames
    pub min_gsd: f64,
    /// Finest GSD shared by the frames
    pub max_gsd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    #[serde(rename = "type")]
    kind: String,
    /// Store file, relative to the catalog root
    #[serde(default)]
    store: Option<String>,
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
    min_gsd: f64,
    max_gsd: f64,
    #[serde(default)]
    coverage: Option<Geometry>,
}

impl IndexEntry {
    fn coverage(&self) -> Coverage {
        let geometry = self.coverage.clone().unwrap_or_else(|| Geometry::Polygon {
            ring: Envelope::new(self.min_lon, self.min_lat, self.max_lon, self.max_lat).to_ring(),
        });
        Coverage {
            geometry,
            min_gsd: self.min_gsd,
            max_gsd: self.max_gsd,
        }
    }
}

/// Folds bounds and GSD ranges of many coverages.
#[derive(Debug, Clone)]
struct CoverageDiscovery {
    bounds: Envelope,
    min_gsd: Option<f64>,
    max_gsd: Option<f64>,
}

impl CoverageDiscovery {
    fn new() -> Self {
        Self {
            bounds: Envelope::empty(),
            min_gsd: None,
            max_gsd: None,
        }
    }

    fn add(&mut self, bounds: &Envelope, min_gsd: f64, max_gsd: f64) {
        self.bounds.union(bounds);
        self.min_gsd = Some(self.min_gsd.map_or(min_gsd, |g| g.max(min_gsd)));
        self.max_gsd = Some(self.max_gsd.map_or(max_gsd, |g| g.min(max_gsd)));
    }

    fn finish(&self) -> Coverage {
        Coverage {
            geometry: Geometry::Polygon {
                ring: self.bounds.to_ring(),
            },
            min_gsd: self.min_gsd.unwrap_or(f64::NAN),
            max_gsd: self.max_gsd.unwrap_or(f64::NAN),
        }
    }
}

// =============================================================================
// Mosaic Database
// =============================================================================

/// Read-only mosaic catalog.
pub struct MosaicDatabase {
    root: PathBuf,
    /// Frames per type; `None` once closed
    stores: Option<BTreeMap<String, Vec<Frame>>>,
    coverages: BTreeMap<String, Coverage>,
    coverage: Option<Coverage>,
}

impl MosaicDatabase {
    /// Open the catalog rooted at `root`.
    ///
    /// A type store that cannot be read or parsed is logged and skipped; its
    /// coverage is still reported.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = root.as_ref().to_path_buf();
        let index_path = root.join(INDEX_FILE);
        let entries: Vec<IndexEntry> = read_json(&index_path)?;

        let mut stores = BTreeMap::new();
        let mut coverages = BTreeMap::new();
        let mut discovery = CoverageDiscovery::new();

        for entry in &entries {
            let coverage = entry.coverage();
            discovery.add(&coverage.geometry.envelope(), coverage.min_gsd, coverage.max_gsd);
            coverages.insert(entry.kind.clone(), coverage);

            if let Some(store) = &entry.store {
                match read_json::<Vec<Frame>>(&root.join(store)) {
                    Ok(frames) => {
                        debug!(kind = %entry.kind, frames = frames.len(), "Loaded frame store");
                        stores.insert(entry.kind.clone(), frames);
                    }
                    Err(e) => {
                        warn!(kind = %entry.kind, error = %e, "Skipping unreadable frame store");
                    }
                }
            }
        }

        let coverage = coverages
            .remove(AGGREGATE_COVERAGE_TYPE)
            .unwrap_or_else(|| discovery.finish());

        info!(
            path = %root.display(),
            types = coverages.len(),
            "Opened mosaic catalog"
        );

        Ok(Self {
            root,
            stores: Some(stores),
            coverages,
            coverage: Some(coverage),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_closed(&self) -> bool {
        self.stores.is_none()
    }

    /// Coverage of the whole catalog.
    pub fn coverage(&self) -> Result<&Coverage, CatalogError> {
        self.coverage.as_ref().ok_or(CatalogError::Closed)
    }

    /// Per-type coverages, excluding the aggregate.
    pub fn coverages(&self) -> Result<&BTreeMap<String, Coverage>, CatalogError> {
        if self.is_closed() {
            return Err(CatalogError::Closed);
        }
        Ok(&self.coverages)
    }

    pub fn coverage_for(&self, kind: &str) -> Result<Option<&Coverage>, CatalogError> {
        Ok(self.coverages()?.get(kind))
    }

    /// Frame types known to the index.
    pub fn types(&self) -> Vec<String> {
        self.coverages.keys().cloned().collect()
    }

    /// Run `params` over the selected type stores.
    ///
    /// Requested types missing from the index are skipped. Fails only with
    /// [`CatalogError::Closed`] after [`Self::close`].
    pub fn query(&self, params: &QueryParameters) -> Result<MosaicCursor, CatalogError> {
        let stores = self.stores.as_ref().ok_or(CatalogError::Closed)?;

        let selected: Vec<&Vec<Frame>> = match &params.types {
            Some(types) => {
                let mut selected = Vec::with_capacity(types.len());
                for kind in types {
                    match stores.get(kind) {
                        Some(frames) => selected.push(frames),
                        None => debug!(kind = %kind, "Skipping unknown frame type"),
                    }
                }
                selected
            }
            None => stores.values().collect(),
        };

        let order = params.order;
        let sources = selected
            .into_iter()
            .map(|frames| {
                let mut matched: Vec<Frame> = frames
                    .iter()
                    .filter(|f| params.matches(f))
                    .cloned()
                    .collect();
                matched.sort_by(|a, b| order.compare(a, b));
                matched
            })
            .collect();

        Ok(MosaicCursor::new(sources, order))
    }

    /// Release the loaded stores. Every later query fails with
    /// [`CatalogError::Closed`].
    pub fn close(&mut self) -> Result<(), CatalogError> {
        if self.stores.take().is_none() {
            return Err(CatalogError::Closed);
        }
        self.coverage = None;
        self.coverages.clear();
        debug!(path = %self.root.display(), "Closed mosaic catalog");
        Ok(())
    }
}

// =============================================================================
// Catalog Builder
// =============================================================================

/// Writes a catalog in the layout read by [`MosaicDatabase`].
#[derive(Debug, Default)]
pub struct MosaicBuilder {
    frames: BTreeMap<String, Vec<Frame>>,
    aggregate: Option<Coverage>,
    next_id: u64,
}

impl MosaicBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame, assigning it the next id.
    pub fn insert(&mut self, mut frame: Frame) -> u64 {
        self.next_id += 1;
        frame.id = self.next_id;
        self.frames.entry(frame.kind.clone()).or_default().push(frame);
        self.next_id
    }

    /// Store an explicit catalog-wide coverage instead of the derived one.
    pub fn aggregate_coverage(mut self, coverage: Coverage) -> Self {
        self.aggregate = Some(coverage);
        self
    }

    /// Write the index and one store per type under `root`.
    pub fn write(&self, root: impl AsRef<Path>) -> Result<(), CatalogError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;

        let mut entries = Vec::with_capacity(self.frames.len() + 1);
        for (kind, frames) in &self.frames {
            let mut discovery = CoverageDiscovery::new();
            for frame in frames {
                discovery.add(&frame.bounds(), frame.min_gsd, frame.max_gsd);
            }

            let store = format!("{kind}.json");
            write_json(&root.join(&store), frames)?;

            let b = discovery.bounds;
            entries.push(IndexEntry {
                kind: kind.clone(),
                store: Some(store),
                min_lat: b.min_y,
                min_lon: b.min_x,
                max_lat: b.max_y,
                max_lon: b.max_x,
                min_gsd: discovery.min_gsd.unwrap_or(f64::NAN),
                max_gsd: discovery.max_gsd.unwrap_or(f64::NAN),
                coverage: None,
            });
        }

        if let Some(aggregate) = &self.aggregate {
            let b = aggregate.geometry.envelope();
            entries.push(IndexEntry {
                kind: AGGREGATE_COVERAGE_TYPE.to_string(),
                store: None,
                min_lat: b.min_y,
                min_lon: b.min_x,
                max_lat: b.max_y,
                max_lon: b.max_x,
                min_gsd: aggregate.min_gsd,
                max_gsd: aggregate.max_gsd,
                coverage: Some(aggregate.geometry.clone()),
            });
        }

        write_json(&root.join(INDEX_FILE), &entries)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CatalogError> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|e| CatalogError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CatalogError> {
    let raw = serde_json::to_vec_pretty(value).map_err(|e| CatalogError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(path, raw)?;
    Ok(())
}
