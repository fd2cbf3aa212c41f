use std::collections::HashMap;
use std::sync::Arc;

use image::{imageops, Rgba, RgbaImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{FloorTextureSource, TransitionError};
use crate::app::{CardinalDirection, Cell, FloorGrid, FloorTypeId};
use crate::config::TransitionConfig;

pub const FLOOR_EDGE_BASE_PERCENT: u32 = 50;
pub const FOG_EDGE_BASE_PERCENT: u32 = 10;

const SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;
const FOG_STREAM: u64 = 1 << 40;
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const FOG: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Percent chance of erasing a pixel `offset` pixels in from the edge.
/// Ramps linearly from `base` at the edge and saturates at 100.
pub fn erase_chance_percent(offset: u32, diffusion_depth: u32, base: u32) -> u32 {
    if diffusion_depth == 0 {
        return 100;
    }
    let ramp = offset.saturating_mul(100) / diffusion_depth;
    base.saturating_add(ramp).min(100)
}

/// Foreign floor types around a cell in N, E, S, W order.
/// A side matching the cell's own floor, or lying past the grid edge, is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransitionKey(pub [Option<FloorTypeId>; 4]);

impl TransitionKey {
    pub fn new(
        north: Option<FloorTypeId>,
        east: Option<FloorTypeId>,
        south: Option<FloorTypeId>,
        west: Option<FloorTypeId>,
    ) -> Self {
        Self([north, east, south, west])
    }

    pub fn for_cell(grid: &FloorGrid, cell: Cell) -> Option<Self> {
        let own = grid.floor_at(cell)?;
        let mut sides = [None; 4];
        for direction in CardinalDirection::ALL {
            let neighbor = grid.neighbor_floor_or_self(cell, direction)?;
            if neighbor != own {
                sides[direction.index()] = Some(neighbor);
            }
        }
        Some(Self(sides))
    }

    pub fn side(&self, direction: CardinalDirection) -> Option<FloorTypeId> {
        self.0[direction.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub edges: usize,
    pub composites: usize,
    pub fog_edges: usize,
}

/// Procedural floor-edge tiles, memoized for the session.
pub struct TransitionGenerator {
    config: TransitionConfig,
    source: Box<dyn FloorTextureSource + Send>,
    source_tiles: HashMap<FloorTypeId, RgbaImage>,
    edges: HashMap<(CardinalDirection, FloorTypeId), Arc<RgbaImage>>,
    composites: HashMap<TransitionKey, Arc<RgbaImage>>,
    fog_edges: HashMap<CardinalDirection, Arc<RgbaImage>>,
}

impl std::fmt::Debug for TransitionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionGenerator")
            .field("config", &self.config)
            .field("stats", &self.cache_stats())
            .finish_non_exhaustive()
    }
}

impl TransitionGenerator {
    pub fn new(
        config: TransitionConfig,
        source: Box<dyn FloorTextureSource + Send>,
    ) -> Result<Self, TransitionError> {
        let invalid = config.tile_size == 0
            || config.diffusion_depth == 0
            || config.diffusion_depth > config.tile_size
            || source.tile_size() != config.tile_size;
        if invalid {
            return Err(TransitionError::InvalidGeometry {
                tile_size: config.tile_size,
                diffusion_depth: config.diffusion_depth,
            });
        }
        Ok(Self {
            config,
            source,
            source_tiles: HashMap::new(),
            edges: HashMap::new(),
            composites: HashMap::new(),
            fog_edges: HashMap::new(),
        })
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Edge tile of `floor` fading in from the `direction` side. Repeated calls return the
    /// same allocation.
    pub fn create_transition(
        &mut self,
        direction: CardinalDirection,
        floor: FloorTypeId,
    ) -> Result<Arc<RgbaImage>, TransitionError> {
        if let Some(tile) = self.edges.get(&(direction, floor)) {
            return Ok(Arc::clone(tile));
        }
        let mut tile = self.source_tile(floor)?.clone();
        let stream = (u64::from(floor.0) << 2) | direction.index() as u64;
        let mut rng = self.rng_for(stream);
        diffuse_edge(
            &mut tile,
            direction,
            self.config.diffusion_depth,
            FLOOR_EDGE_BASE_PERCENT,
            &mut rng,
        );
        let tile = Arc::new(tile);
        self.edges.insert((direction, floor), Arc::clone(&tile));
        debug!(
            direction = direction.as_token(),
            floor = floor.0,
            "transition_edge_generated"
        );
        Ok(tile)
    }

    /// All foreign sides of `key` drawn into one tile.
    pub fn composite(&mut self, key: TransitionKey) -> Result<Arc<RgbaImage>, TransitionError> {
        if let Some(tile) = self.composites.get(&key) {
            return Ok(Arc::clone(tile));
        }
        let size = self.config.tile_size;
        let mut canvas = RgbaImage::from_pixel(size, size, TRANSPARENT);
        for direction in CardinalDirection::ALL {
            if let Some(floor) = key.side(direction) {
                let edge = self.create_transition(direction, floor)?;
                imageops::overlay(&mut canvas, edge.as_ref(), 0, 0);
            }
        }
        let tile = Arc::new(canvas);
        self.composites.insert(key, Arc::clone(&tile));
        debug!(?key, composites = self.composites.len(), "transition_composite_cached");
        Ok(tile)
    }

    /// Composite for `cell`, or `None` when every side shares the cell's floor.
    pub fn transition_for_cell(
        &mut self,
        grid: &FloorGrid,
        cell: Cell,
    ) -> Result<Option<Arc<RgbaImage>>, TransitionError> {
        match TransitionKey::for_cell(grid, cell) {
            Some(key) if !key.is_empty() => self.composite(key).map(Some),
            _ => Ok(None),
        }
    }

    /// Dithered black edge drawn where visible cells meet unknown ones.
    pub fn fog_edge(&mut self, direction: CardinalDirection) -> Arc<RgbaImage> {
        if let Some(tile) = self.fog_edges.get(&direction) {
            return Arc::clone(tile);
        }
        let size = self.config.tile_size;
        let mut tile = RgbaImage::from_pixel(size, size, FOG);
        let mut rng = self.rng_for(FOG_STREAM | direction.index() as u64);
        diffuse_edge(
            &mut tile,
            direction,
            self.config.diffusion_depth,
            FOG_EDGE_BASE_PERCENT,
            &mut rng,
        );
        let tile = Arc::new(tile);
        self.fog_edges.insert(direction, Arc::clone(&tile));
        tile
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            edges: self.edges.len(),
            composites: self.composites.len(),
            fog_edges: self.fog_edges.len(),
        }
    }

    /// Cached composites in a stable order.
    pub fn composites(&self) -> Vec<(TransitionKey, Arc<RgbaImage>)> {
        let mut entries: Vec<_> = self
            .composites
            .iter()
            .map(|(key, tile)| (*key, Arc::clone(tile)))
            .collect();
        entries.sort_by_key(|(key, _)| key.0.map(|side| side.map(|floor| floor.0)));
        entries
    }

    fn source_tile(&mut self, floor: FloorTypeId) -> Result<&RgbaImage, TransitionError> {
        if !self.source_tiles.contains_key(&floor) {
            let tile = self.source.floor_tile(floor)?;
            self.source_tiles.insert(floor, tile);
        }
        self.source_tiles
            .get(&floor)
            .ok_or(TransitionError::MissingFloor { floor })
    }

    fn rng_for(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.config.seed ^ stream.wrapping_mul(SEED_MIX))
    }
}

/// Keeps a `depth`-wide band along the `direction` edge and erases the rest, then ragged-fades
/// the band with a per-pixel erase chance ramping up from `base` at the edge.
fn diffuse_edge(
    tile: &mut RgbaImage,
    direction: CardinalDirection,
    depth: u32,
    base: u32,
    rng: &mut impl Rng,
) {
    let size = tile.width();
    for offset in depth..size {
        for along in 0..size {
            let (x, y) = edge_pixel(direction, size, offset, along);
            tile.put_pixel(x, y, TRANSPARENT);
        }
    }
    for offset in 0..=depth.min(size.saturating_sub(1)) {
        let chance = erase_chance_percent(offset, depth, base);
        for along in 0..size {
            if rng.gen_range(0..100) < chance {
                let (x, y) = edge_pixel(direction, size, offset, along);
                tile.put_pixel(x, y, TRANSPARENT);
            }
        }
    }
}

/// Pixel `offset` steps in from the `direction` edge and `along` steps parallel to it.
fn edge_pixel(direction: CardinalDirection, size: u32, offset: u32, along: u32) -> (u32, u32) {
    let last = size - 1;
    match direction {
        CardinalDirection::North => (along, offset),
        CardinalDirection::South => (along, last - offset),
        CardinalDirection::West => (offset, along),
        CardinalDirection::East => (last - offset, along),
    }
}
