mod atlas;
mod generator;
mod shared;
mod source;

use std::path::PathBuf;

use thiserror::Error;

use crate::app::FloorTypeId;

pub use atlas::{AtlasError, AtlasSlot, TransitionAtlas};
pub use generator::{
    erase_chance_percent, CacheStats, TransitionGenerator, TransitionKey, FLOOR_EDGE_BASE_PERCENT,
    FOG_EDGE_BASE_PERCENT,
};
pub use shared::SharedTransitions;
pub use source::{FloorTextureSource, PngDirectorySource, SolidColorSource};

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("invalid transition geometry: tile size {tile_size}, diffusion depth {diffusion_depth}")]
    InvalidGeometry { tile_size: u32, diffusion_depth: u32 },
    #[error("no texture for floor type {}", floor.0)]
    MissingFloor { floor: FloorTypeId },
    #[error("failed to read floor texture {path}: {source}")]
    ReadTexture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(
        "floor texture for type {} is {width}x{height}, expected {expected}x{expected}",
        floor.0
    )]
    TextureSize {
        floor: FloorTypeId,
        width: u32,
        height: u32,
        expected: u32,
    },
}
