use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{imageops, ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::info;

use crate::atomic_io::write_bytes_atomic;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("atlas is full: {capacity} regions already claimed")]
    CapacityExceeded { capacity: u32 },
    #[error("tile is {width}x{height}, atlas regions are {expected}x{expected}")]
    TileSize {
        expected: u32,
        width: u32,
        height: u32,
    },
    #[error("failed to encode atlas png: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write atlas {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Region claimed for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasSlot {
    pub index: u32,
    pub x: u32,
    pub y: u32,
}

/// Square power-of-two texture holding up to a fixed number of equally sized tiles, filled
/// row by row.
#[derive(Debug, Clone)]
pub struct TransitionAtlas {
    tile_size: u32,
    per_row: u32,
    max_regions: u32,
    next: u32,
    image: RgbaImage,
}

impl TransitionAtlas {
    /// Smallest power-of-two square whose area fits `capacity` tiles.
    pub fn new(capacity: u32, tile_size: u32) -> Self {
        let area = f64::from(capacity.max(1)) * f64::from(tile_size) * f64::from(tile_size);
        let side = area.sqrt().ceil() as u32;
        let dimension = side.max(tile_size).max(1).next_power_of_two();
        let per_row = if tile_size == 0 {
            0
        } else {
            dimension / tile_size
        };
        Self {
            tile_size,
            per_row,
            max_regions: per_row.saturating_mul(per_row),
            next: 0,
            image: RgbaImage::new(dimension, dimension),
        }
    }

    pub fn dimension(&self) -> u32 {
        self.image.width()
    }

    pub fn max_regions(&self) -> u32 {
        self.max_regions
    }

    pub fn len(&self) -> u32 {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn slot(&self, index: u32) -> Option<AtlasSlot> {
        (index < self.max_regions).then(|| AtlasSlot {
            index,
            x: (index % self.per_row) * self.tile_size,
            y: (index / self.per_row) * self.tile_size,
        })
    }

    pub fn insert(&mut self, tile: &RgbaImage) -> Result<AtlasSlot, AtlasError> {
        if tile.width() != self.tile_size || tile.height() != self.tile_size {
            return Err(AtlasError::TileSize {
                expected: self.tile_size,
                width: tile.width(),
                height: tile.height(),
            });
        }
        let slot = self.slot(self.next).ok_or(AtlasError::CapacityExceeded {
            capacity: self.max_regions,
        })?;
        imageops::replace(&mut self.image, tile, i64::from(slot.x), i64::from(slot.y));
        self.next += 1;
        Ok(slot)
    }

    pub fn export_png(&self, path: &Path) -> Result<(), AtlasError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        write_bytes_atomic(path, &bytes).map_err(|source| AtlasError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            regions = self.next,
            dimension = self.dimension(),
            "transition_atlas_exported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn dimension_is_power_of_two_fitting_capacity() {
        let atlas = TransitionAtlas::new(5, 32);
        // 5 * 32 * 32 = 5120, sqrt ~ 71.6 -> 72 -> 128
        assert_eq!(atlas.dimension(), 128);
        assert_eq!(atlas.max_regions(), 16);

        let exact = TransitionAtlas::new(4, 32);
        assert_eq!(exact.dimension(), 64);
        assert_eq!(exact.max_regions(), 4);
    }

    #[test]
    fn regions_fill_row_by_row() {
        let mut atlas = TransitionAtlas::new(4, 2);
        let tile = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let first = atlas.insert(&tile).expect("first");
        let second = atlas.insert(&tile).expect("second");
        let third = atlas.insert(&tile).expect("third");
        assert_eq!(first, AtlasSlot { index: 0, x: 0, y: 0 });
        assert_eq!(second, AtlasSlot { index: 1, x: 2, y: 0 });
        assert_eq!(third, AtlasSlot { index: 2, x: 0, y: 2 });
        assert_eq!(atlas.image().get_pixel(1, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(atlas.image().get_pixel(3, 3)[3], 0);
    }

    #[test]
    fn claiming_past_capacity_fails() {
        let mut atlas = TransitionAtlas::new(4, 2);
        let tile = RgbaImage::new(2, 2);
        for _ in 0..4 {
            atlas.insert(&tile).expect("fits");
        }
        assert!(matches!(
            atlas.insert(&tile),
            Err(AtlasError::CapacityExceeded { capacity: 4 })
        ));
    }

    #[test]
    fn wrong_tile_size_is_rejected() {
        let mut atlas = TransitionAtlas::new(4, 2);
        assert!(matches!(
            atlas.insert(&RgbaImage::new(3, 2)),
            Err(AtlasError::TileSize { .. })
        ));
    }

    #[test]
    fn export_writes_decodable_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache").join("transitions.png");
        let mut atlas = TransitionAtlas::new(2, 4);
        atlas
            .insert(&RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])))
            .expect("insert");
        atlas.export_png(&path).expect("export");

        let decoded = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
        assert!(!path.with_file_name("transitions.png.tmp").exists());
    }
}
