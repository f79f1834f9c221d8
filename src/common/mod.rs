use std::time::Duration;

use serde::{Deserialize, Serialize};

mod position;
pub use position::{Heading, TilePos};

/// Uniquely identifies an actor, player or dropped item in the world.
/// Ids are handed out monotonically and never reused.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObjectId(pub u32);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a map (zone) of the world.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MapId(pub u16);

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item id used for gold stacks dropped on the ground.
pub const GOLD_ITEM_ID: u32 = 1;

/// How many random tiles the placement search samples before giving up.
pub const PLACEMENT_ATTEMPTS: usize = 24;

/// Default Chebyshev distance observers can see state changes from.
pub const VISIBILITY_RADIUS: i32 = 15;

/// Default radius around an origin that a respawn may land in.
pub const RESPAWN_SEARCH_RADIUS: i32 = 3;

/// Default radius around a corpse that gold and loot can be dropped in.
pub const DROP_SEARCH_RADIUS: i32 = 2;

/// Default pause between respawn attempts that lost their tile.
pub const RESPAWN_RETRY_PAUSE: Duration = Duration::from_millis(1000);

/// Default interval of the tick driver.
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Experience granted per level of the defeated monster.
pub const EXPERIENCE_PER_LEVEL: u32 = 10;

/// Returns the Chebyshev distance between `a` and `b`, which matches 8-directional movement.
pub fn chebyshev_distance(a: TilePos, b: TilePos) -> i32 {
    i32::max((a.x - b.x).abs(), (a.y - b.y).abs())
}
