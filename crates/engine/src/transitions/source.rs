use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{ImageReader, Rgba, RgbaImage};
use tracing::debug;

use super::TransitionError;
use crate::app::FloorTypeId;

/// Supplies the full, square source tile of a floor type.
pub trait FloorTextureSource {
    fn tile_size(&self) -> u32;
    fn floor_tile(&self, floor: FloorTypeId) -> Result<RgbaImage, TransitionError>;
}

/// Reads `<dir>/<floor id>.png`.
#[derive(Debug, Clone)]
pub struct PngDirectorySource {
    dir: PathBuf,
    tile_size: u32,
}

impl PngDirectorySource {
    pub fn new(dir: impl Into<PathBuf>, tile_size: u32) -> Self {
        Self {
            dir: dir.into(),
            tile_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, floor: FloorTypeId) -> PathBuf {
        self.dir.join(format!("{}.png", floor.0))
    }
}

impl FloorTextureSource for PngDirectorySource {
    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn floor_tile(&self, floor: FloorTypeId) -> Result<RgbaImage, TransitionError> {
        let path = self.path_for(floor);
        if !path.is_file() {
            return Err(TransitionError::MissingFloor { floor });
        }
        let image = ImageReader::open(&path)
            .map_err(|source| TransitionError::ReadTexture {
                path: path.clone(),
                source: image::ImageError::IoError(source),
            })?
            .decode()
            .map_err(|source| TransitionError::ReadTexture {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        if image.width() != self.tile_size || image.height() != self.tile_size {
            return Err(TransitionError::TextureSize {
                floor,
                width: image.width(),
                height: image.height(),
                expected: self.tile_size,
            });
        }
        debug!(floor = floor.0, path = %path.display(), "floor_texture_loaded");
        Ok(image)
    }
}

/// Flat-colored tiles, for headless runs and tests.
#[derive(Debug, Clone)]
pub struct SolidColorSource {
    tile_size: u32,
    colors: HashMap<FloorTypeId, Rgba<u8>>,
}

impl SolidColorSource {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            colors: HashMap::new(),
        }
    }

    pub fn with_floor(mut self, floor: FloorTypeId, color: [u8; 4]) -> Self {
        self.colors.insert(floor, Rgba(color));
        self
    }
}

impl FloorTextureSource for SolidColorSource {
    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn floor_tile(&self, floor: FloorTypeId) -> Result<RgbaImage, TransitionError> {
        let color = self
            .colors
            .get(&floor)
            .copied()
            .ok_or(TransitionError::MissingFloor { floor })?;
        Ok(RgbaImage::from_pixel(self.tile_size, self.tile_size, color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_directory_source_reads_tile() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tile = RgbaImage::from_pixel(4, 4, Rgba([10, 200, 30, 255]));
        tile.save(dir.path().join("3.png")).expect("save");

        let source = PngDirectorySource::new(dir.path(), 4);
        let loaded = source.floor_tile(FloorTypeId(3)).expect("load");
        assert_eq!(loaded.get_pixel(2, 2), &Rgba([10, 200, 30, 255]));
    }

    #[test]
    fn png_directory_source_rejects_wrong_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        RgbaImage::new(8, 4)
            .save(dir.path().join("1.png"))
            .expect("save");
        let source = PngDirectorySource::new(dir.path(), 4);
        let error = source.floor_tile(FloorTypeId(1)).expect_err("size");
        assert!(matches!(
            error,
            TransitionError::TextureSize {
                width: 8,
                height: 4,
                expected: 4,
                ..
            }
        ));
    }

    #[test]
    fn missing_floor_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = PngDirectorySource::new(dir.path(), 4);
        assert!(matches!(
            source.floor_tile(FloorTypeId(9)),
            Err(TransitionError::MissingFloor { .. })
        ));
        assert!(matches!(
            SolidColorSource::new(4).floor_tile(FloorTypeId(9)),
            Err(TransitionError::MissingFloor { .. })
        ));
    }
}
