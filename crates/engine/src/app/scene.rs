use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// World cell coordinate. `y` grows southward, so north of `(x, y)` is `(x, y - 1)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn neighbor(self, direction: CardinalDirection) -> Self {
        let (dx, dy) = direction.offset();
        self.offset(dx, dy)
    }

    pub fn chebyshev_distance(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn euclidean_distance(self, other: Cell) -> f32 {
        (self.as_vec2() - other.as_vec2()).length()
    }

    pub fn is_adjacent(self, other: Cell) -> bool {
        self.chebyshev_distance(other) == 1
    }

    pub fn direction_to(self, other: Cell) -> Option<Direction8> {
        if !self.is_adjacent(other) {
            return None;
        }
        Direction8::from_offset(other.x - self.x, other.y - self.y)
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2 {
            x: self.x as f32,
            y: self.y as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalDirection {
    North,
    East,
    South,
    West,
}

impl CardinalDirection {
    pub const ALL: [CardinalDirection; 4] = [
        CardinalDirection::North,
        CardinalDirection::East,
        CardinalDirection::South,
        CardinalDirection::West,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Self::North | Self::South)
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction8 {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction8 {
    pub const ALL: [Direction8; 8] = [
        Direction8::North,
        Direction8::NorthEast,
        Direction8::East,
        Direction8::SouthEast,
        Direction8::South,
        Direction8::SouthWest,
        Direction8::West,
        Direction8::NorthWest,
    ];

    pub fn from_offset(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(Self::North),
            (1, -1) => Some(Self::NorthEast),
            (1, 0) => Some(Self::East),
            (1, 1) => Some(Self::SouthEast),
            (0, 1) => Some(Self::South),
            (-1, 1) => Some(Self::SouthWest),
            (-1, 0) => Some(Self::West),
            (-1, -1) => Some(Self::NorthWest),
            _ => None,
        }
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FloorTypeId(pub u16);

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PlaneLevel(pub i32);

/// Floor types of one plane, row-major with `(0, 0)` in the north-west corner.
#[derive(Debug, Clone, PartialEq)]
pub struct FloorGrid {
    width: u32,
    height: u32,
    floors: Vec<FloorTypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FloorGridError {
    #[error("floor count mismatch: expected {expected}, got {actual}")]
    FloorCountMismatch { expected: usize, actual: usize },
}

impl FloorGrid {
    pub fn new(width: u32, height: u32, floors: Vec<FloorTypeId>) -> Result<Self, FloorGridError> {
        let expected = width as usize * height as usize;
        let actual = floors.len();
        if expected != actual {
            return Err(FloorGridError::FloorCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            floors,
        })
    }

    pub fn filled(width: u32, height: u32, floor: FloorTypeId) -> Self {
        Self {
            width,
            height,
            floors: vec![floor; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.index_of(cell).is_some()
    }

    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        let (x, y) = (cell.x as u32, cell.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn floor_at(&self, cell: Cell) -> Option<FloorTypeId> {
        self.index_of(cell)
            .and_then(|index| self.floors.get(index).copied())
    }

    pub fn set_floor(&mut self, cell: Cell, floor: FloorTypeId) -> bool {
        match self.index_of(cell) {
            Some(index) => {
                self.floors[index] = floor;
                true
            }
            None => false,
        }
    }

    /// Neighbor floor on `direction`; cells past the edge report the cell's own floor.
    pub fn neighbor_floor_or_self(
        &self,
        cell: Cell,
        direction: CardinalDirection,
    ) -> Option<FloorTypeId> {
        let own = self.floor_at(cell)?;
        Some(self.floor_at(cell.neighbor(direction)).unwrap_or(own))
    }
}
