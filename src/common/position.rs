use serde::{Deserialize, Serialize};

/// Represents a tile on a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the tile offset by `dx` and `dy`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// One of the eight directions an actor can face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    North,
    NorthEast,
    East,
    SouthEast,
    #[default]
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Heading {
    /// Returns the heading that points from `from` towards `to`.
    /// If both tiles are the same, returns `None`.
    pub fn towards(from: TilePos, to: TilePos) -> Option<Heading> {
        // Y grows southwards, like most tile maps
        let heading = match ((to.x - from.x).signum(), (to.y - from.y).signum()) {
            (0, -1) => Heading::North,
            (1, -1) => Heading::NorthEast,
            (1, 0) => Heading::East,
            (1, 1) => Heading::SouthEast,
            (0, 1) => Heading::South,
            (-1, 1) => Heading::SouthWest,
            (-1, 0) => Heading::West,
            (-1, -1) => Heading::NorthWest,
            _ => return None,
        };

        Some(heading)
    }

    /// The unit step taken when moving in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Heading::North => (0, -1),
            Heading::NorthEast => (1, -1),
            Heading::East => (1, 0),
            Heading::SouthEast => (1, 1),
            Heading::South => (0, 1),
            Heading::SouthWest => (-1, 1),
            Heading::West => (-1, 0),
            Heading::NorthWest => (-1, -1),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Heading> {
        let heading = match value {
            0 => Heading::North,
            1 => Heading::NorthEast,
            2 => Heading::East,
            3 => Heading::SouthEast,
            4 => Heading::South,
            5 => Heading::SouthWest,
            6 => Heading::West,
            7 => Heading::NorthWest,
            _ => return None,
        };

        Some(heading)
    }
}
