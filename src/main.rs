//! tilecore - tile reading and mosaic catalog CLI.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tilecore::{
    config::{Cli, Command, InfoConfig, QueryConfig, ReadConfig},
    io::AsyncIo,
    mosaic::MosaicDatabase,
    reader::{RawRasterDecoder, TileReader},
    tile::{DiskTileCache, TileEncoder},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Info(config) => run_info(config),
        Command::Read(config) => run_read(config).await,
        Command::Query(config) => run_query(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tilecore=debug"
    } else {
        "tilecore=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.verbose);

    let geometry = match config.geometry() {
        Ok(g) => g,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let json = serde_json::json!({
        "width": geometry.native_width(),
        "height": geometry.native_height(),
        "tile_width": geometry.tile_width(),
        "tile_height": geometry.tile_height(),
        "max_resolution_levels": geometry.max_num_resolution_levels(),
        "levels": geometry.levels(),
    });
    match serde_json::to_string_pretty(&json) {
        Ok(s) => {
            println!("{}", s);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize geometry: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Read Command
// =============================================================================

async fn run_read(config: ReadConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match read_tile(&config).await {
        Ok(bytes) => {
            info!(
                "Wrote tile ({}, {}) at level {} to {} ({} bytes)",
                config.column,
                config.row,
                config.level,
                config.out.display(),
                bytes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Decode one tile through the scheduler and write it to `config.out`.
async fn read_tile(config: &ReadConfig) -> Result<usize, String> {
    let layout = config.raw_layout()?;
    let decoder = RawRasterDecoder::open(&config.raw, layout)
        .map_err(|e| format!("Failed to open {}: {}", config.raw.display(), e))?;

    let io = AsyncIo::with_idle_timeout(config.idle_timeout());
    let mut builder = TileReader::builder(Box::new(decoder)).io(io.clone());
    if let Some(dir) = &config.cache_dir {
        builder = builder
            .cache(dir.display().to_string(), DiskTileCache::opener())
            .min_cache_level(config.min_cache_level);
    }
    let reader = builder.build().map_err(|e| e.to_string())?;

    info!(
        "Reading {}x{} raster, {} levels",
        reader.width(0),
        reader.height(0),
        reader.max_num_resolution_levels()
    );

    let result = reader
        .read_tile_async(config.level, config.column, config.row)
        .await;
    let geometry = *reader.geometry();
    let (format, interleave) = (reader.format(), reader.interleave());
    reader.dispose();
    let pixels = result.map_err(|e| format!("Tile read failed: {}", e))?;

    let encoded = TileEncoder::new()
        .encode(
            &pixels,
            geometry.tile_width_at(config.level, config.column),
            geometry.tile_height_at(config.level, config.row),
            format,
            interleave,
            config.encoding(),
        )
        .map_err(|e| e.to_string())?;

    std::fs::write(&config.out, &encoded)
        .map_err(|e| format!("Failed to write {}: {}", config.out.display(), e))?;
    io.release();
    Ok(encoded.len())
}

// =============================================================================
// Query Command
// =============================================================================

fn run_query(config: QueryConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let db = match MosaicDatabase::open(&config.catalog) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open catalog {}: {}", config.catalog.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let cursor = match db.query(&config.to_query()) {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Query failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut count = 0usize;
    for frame in cursor {
        match serde_json::to_string(&frame) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                error!("Failed to serialize frame {}: {}", frame.id, e);
                return ExitCode::FAILURE;
            }
        }
        count += 1;
    }

    info!("{} frame(s) matched", count);
    ExitCode::SUCCESS
}
