//! Configuration management for the tilecore CLI.
//!
//! Every subcommand is a clap derive struct. Options that are commonly fixed
//! per machine can also be set through environment variables with the
//! `TILECORE_` prefix:
//!
//! - `TILECORE_TILE_SIZE` - Nominal tile size in pixels (default: 256)
//! - `TILECORE_CACHE_DIR` - Directory for the on-disk tile cache
//! - `TILECORE_MIN_CACHE_LEVEL` - First level served through the cache (default: 0)
//! - `TILECORE_IDLE_MS` - Scheduler idle timeout; 0 parks the thread (default: 0)
//! - `TILECORE_JPEG_QUALITY` - JPEG quality for `.jpg` output (default: 80)
//! - `TILECORE_CATALOG` - Mosaic catalog directory for `query`
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use tilecore::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Info(config) => println!("{}x{}", config.width, config.height),
//!     _ => {}
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::mosaic::{Envelope, GsdCompare, Order, QueryParameters};
use crate::pixel::{Interleave, SampleLayout, SampleType};
use crate::reader::{RawLayout, TileGeometry};
use crate::tile::{is_valid_quality, TileEncoding, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default nominal tile size.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default scheduler idle timeout in milliseconds (park forever).
pub const DEFAULT_IDLE_MS: u64 = 0;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tilecore - multi-resolution tile reading and mosaic catalog queries.
#[derive(Parser, Debug, Clone)]
#[command(name = "tilecore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the resolution levels of an image as JSON.
    Info(InfoConfig),

    /// Read one tile from a raw raster file and write it as PNG or JPEG.
    Read(ReadConfig),

    /// Query a mosaic catalog and print matching frames as JSON lines.
    Query(QueryConfig),
}

/// Sample layout of a raw raster file.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterleaveArg {
    /// Band sequential
    Bsq,
    /// Pixel interleaved
    #[default]
    Bip,
    /// Line interleaved
    Bil,
}

impl From<InterleaveArg> for Interleave {
    fn from(arg: InterleaveArg) -> Self {
        match arg {
            InterleaveArg::Bsq => Interleave::Bsq,
            InterleaveArg::Bip => Interleave::Bip,
            InterleaveArg::Bil => Interleave::Bil,
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Native image width in pixels.
    #[arg(long)]
    pub width: u64,

    /// Native image height in pixels.
    #[arg(long)]
    pub height: u64,

    /// Nominal tile width.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILECORE_TILE_SIZE")]
    pub tile_width: u32,

    /// Nominal tile height.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILECORE_TILE_SIZE")]
    pub tile_height: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.geometry().map(|_| ())
    }

    pub fn geometry(&self) -> Result<TileGeometry, String> {
        TileGeometry::new(self.width, self.height, self.tile_width, self.tile_height)
            .map_err(|e| e.to_string())
    }
}

// =============================================================================
// Read Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ReadConfig {
    /// Raw raster file.
    #[arg(long)]
    pub raw: PathBuf,

    /// Native image width in pixels.
    #[arg(long)]
    pub width: u64,

    /// Native image height in pixels.
    #[arg(long)]
    pub height: u64,

    /// Number of bands (1-4).
    #[arg(long, default_value_t = 1)]
    pub bands: usize,

    /// Storage width of one sample in bytes.
    #[arg(long, default_value_t = 1)]
    pub bytes_per_sample: usize,

    /// Samples are IEEE floats normalized to [0, 1].
    #[arg(long, default_value_t = false)]
    pub float: bool,

    /// True sample depth when narrower than the storage width.
    #[arg(long)]
    pub abpp: Option<u8>,

    /// Sample layout of the file.
    #[arg(long, value_enum, default_value_t = InterleaveArg::Bip)]
    pub interleave: InterleaveArg,

    /// Resolution level (0 = full resolution).
    #[arg(long, default_value_t = 0)]
    pub level: u32,

    /// Tile column.
    #[arg(long, default_value_t = 0)]
    pub column: u64,

    /// Tile row.
    #[arg(long, default_value_t = 0)]
    pub row: u64,

    /// Nominal tile size.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILECORE_TILE_SIZE")]
    pub tile_size: u32,

    /// Directory for the on-disk tile cache.
    #[arg(long, env = "TILECORE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// First level read through the tile cache.
    #[arg(long, default_value_t = 0, env = "TILECORE_MIN_CACHE_LEVEL")]
    pub min_cache_level: u32,

    /// Scheduler idle timeout in milliseconds; 0 parks the worker.
    #[arg(long, default_value_t = DEFAULT_IDLE_MS, env = "TILECORE_IDLE_MS")]
    pub idle_ms: u64,

    /// JPEG quality when writing a .jpg file (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TILECORE_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Output image (.png, .jpg).
    #[arg(long)]
    pub out: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ReadConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=4).contains(&self.bands) {
            return Err("bands must be between 1 and 4".to_string());
        }
        self.sample_type()?;

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        let geometry = TileGeometry::new(self.width, self.height, self.tile_size, self.tile_size)
            .map_err(|e| e.to_string())?;
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        if self.column >= geometry.num_tiles_x(self.level)
            || self.row >= geometry.num_tiles_y(self.level)
        {
            return Err(format!(
                "tile ({}, {}) is outside level {} ({}x{} tiles)",
                self.column,
                self.row,
                self.level,
                geometry.num_tiles_x(self.level),
                geometry.num_tiles_y(self.level)
            ));
        }

        Ok(())
    }

    pub fn sample_type(&self) -> Result<SampleType, String> {
        SampleType::from_width(self.bytes_per_sample, self.float).ok_or_else(|| {
            format!(
                "unsupported sample: {} bytes{}",
                self.bytes_per_sample,
                if self.float { " float" } else { "" }
            )
        })
    }

    pub fn raw_layout(&self) -> Result<RawLayout, String> {
        Ok(RawLayout {
            width: self.width,
            height: self.height,
            bands: self.bands,
            sample: SampleLayout::new(self.sample_type()?, self.abpp),
            interleave: self.interleave.into(),
            tile_width: self.tile_size,
            tile_height: self.tile_size,
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    /// Output encoding picked from the `out` extension.
    pub fn encoding(&self) -> TileEncoding {
        let ext = self
            .out
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match TileEncoding::from_extension(ext) {
            TileEncoding::Jpeg { .. } => TileEncoding::Jpeg {
                quality: self.jpeg_quality,
            },
            encoding => encoding,
        }
    }
}

// =============================================================================
// Query Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct QueryConfig {
    /// Mosaic catalog directory.
    #[arg(long, env = "TILECORE_CATALOG")]
    pub catalog: PathBuf,

    /// Exact frame path.
    #[arg(long)]
    pub path: Option<String>,

    /// Spatial filter as minX,minY,maxX,maxY (degrees).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub bbox: Option<Vec<f64>>,

    /// Only frames whose compared GSD is at most this value.
    #[arg(long)]
    pub min_gsd: Option<f64>,

    /// Frame GSD compared against --min-gsd (min or max).
    #[arg(long, default_value = "max")]
    pub min_gsd_compare: GsdCompare,

    /// Only frames whose compared GSD is at least this value.
    #[arg(long)]
    pub max_gsd: Option<f64>,

    /// Frame GSD compared against --max-gsd (min or max).
    #[arg(long, default_value = "max")]
    pub max_gsd_compare: GsdCompare,

    /// Restrict to a frame type (repeatable).
    #[arg(long = "type")]
    pub types: Vec<String>,

    /// Spatial reference id.
    #[arg(long)]
    pub srid: Option<i32>,

    /// Precision imagery flag.
    #[arg(long)]
    pub precision: Option<bool>,

    /// Result order.
    #[arg(long, default_value = "max-gsd-desc")]
    pub order: Order,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(bbox) = &self.bbox {
            if bbox.len() != 4 {
                return Err("bbox must have exactly 4 values: minX,minY,maxX,maxY".to_string());
            }
        }
        for gsd in [self.min_gsd, self.max_gsd].into_iter().flatten() {
            if !gsd.is_finite() || gsd < 0.0 {
                return Err(format!("invalid GSD {gsd}: must be a finite value >= 0"));
            }
        }
        Ok(())
    }

    pub fn to_query(&self) -> QueryParameters {
        let mut params = QueryParameters::new().with_order(self.order);
        params.path = self.path.clone();
        if let Some([x0, y0, x1, y1]) = self.bbox.as_deref().and_then(|b| <[f64; 4]>::try_from(b).ok()) {
            params = params.with_spatial_filter(Envelope::new(x0, y0, x1, y1));
        }
        if let Some(gsd) = self.min_gsd {
            params = params.with_min_gsd(gsd, self.min_gsd_compare);
        }
        if let Some(gsd) = self.max_gsd {
            params = params.with_max_gsd(gsd, self.max_gsd_compare);
        }
        for kind in &self.types {
            params = params.with_type(kind.clone());
        }
        params.srid = self.srid;
        params.precision_imagery = self.precision;
        params
    }
}

// =============================================================================
// Tests
// =============================================================================
