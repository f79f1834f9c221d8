use std::collections::HashSet;

use crate::{
    common::{MapId, TilePos},
    world::MapData,
};

/// Represents a loaded map and its static terrain.
#[derive(Debug, Default, Clone)]
pub struct Zone {
    pub id: MapId,
    pub width: i32,
    pub height: i32,
    blocked: HashSet<TilePos>,
}

impl Zone {
    pub fn load(data: &MapData) -> Self {
        Self {
            id: data.id,
            width: data.width,
            height: data.height,
            blocked: data.blocked.iter().copied().collect(),
        }
    }

    pub fn in_bounds(&self, position: TilePos) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    /// Whether this tile is permanently blocked by terrain.
    pub fn is_blocked(&self, position: TilePos) -> bool {
        self.blocked.contains(&position)
    }

    /// Whether anything could ever stand on this tile.
    pub fn is_walkable(&self, position: TilePos) -> bool {
        self.in_bounds(position) && !self.is_blocked(position)
    }
}
