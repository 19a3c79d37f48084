use std::path::PathBuf;

use thiserror::Error;

use crate::grid::GridMapError;
use crate::tile_keys::TileKeyError;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tile set {path} has invalid tile size {width}x{height}")]
    InvalidTileSize {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("tile set {path}: {source}")]
    TileSet {
        path: PathBuf,
        #[source]
        source: TileKeyError,
    },
    #[error("map {path}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: GridMapError,
    },
    #[error("entity template {path} has an unusable pose: {source}")]
    Pose {
        path: PathBuf,
        #[source]
        source: TileKeyError,
    },
}
