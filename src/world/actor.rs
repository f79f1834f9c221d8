use std::time::{Duration, Instant};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::common::{Heading, MapId, ObjectId, TilePos};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActorFlags : u8 {
        const NONE = 0x00;
        /// Seeks out and attacks players on its own.
        const HOSTILE = 0x01;
        /// Can be damaged by players.
        const ATTACKABLE = 0x02;
    }
}

/// Range in seconds a defeated monster waits before coming back.
/// A `max` of zero means it never respawns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnWindow {
    pub min: u32,
    pub max: u32,
}

impl RespawnWindow {
    pub fn is_disabled(&self) -> bool {
        self.max == 0
    }
}

/// Inclusive range of gold dropped on death.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldRange {
    pub min: u32,
    pub max: u32,
}

/// Identifies what and where to respawn. Two deaths with the same key share a single respawn timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginKey {
    pub template_id: u32,
    pub map: MapId,
    pub position: TilePos,
    pub heading: Heading,
}

/// The spawn point an instance was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub template_id: u32,
    pub map: MapId,
    pub position: TilePos,
    pub heading: Heading,
    pub respawn_delay: RespawnWindow,
}

impl Origin {
    pub fn key(&self) -> OriginKey {
        OriginKey {
            template_id: self.template_id,
            map: self.map,
            position: self.position,
            heading: self.heading,
        }
    }
}

/// A stack of items lying on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: u32,
    pub quantity: u32,
}

/// One concrete monster spawned from a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorInstance {
    pub id: ObjectId,
    pub template_id: u32,
    pub map: MapId,
    pub position: TilePos,
    pub heading: Heading,
    pub hp: u32,
    pub max_hp: u32,
    pub level: u32,
    pub flags: ActorFlags,
    pub attack_damage: u32,
    pub attack_cooldown: Duration,
    pub last_attack: Option<Instant>,
    pub aggro_range: i32,
    pub gold: GoldRange,
    pub loot_table: Option<u32>,
    pub death_effect: Option<u32>,
    /// Only meaningful to connected clients, and never persisted.
    pub spawn_index: u32,
    pub origin: Origin,
    /// Set once the death pipeline has claimed this instance.
    pub dying: bool,
}

impl ActorInstance {
    pub fn is_hostile(&self) -> bool {
        self.flags.contains(ActorFlags::HOSTILE)
    }

    pub fn is_attackable(&self) -> bool {
        self.flags.contains(ActorFlags::ATTACKABLE)
    }

    /// Whether anything besides the death pipeline may still act on this instance.
    pub fn is_alive(&self) -> bool {
        self.hp > 0 && !self.dying
    }

    /// Whether enough time has passed since the last swing.
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_attack {
            Some(last_attack) => now.saturating_duration_since(last_attack) >= self.attack_cooldown,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkedActor {
    Player {
        name: String,
        map: MapId,
        position: TilePos,
        level: u32,
        hp: u32,
        max_hp: u32,
        experience: u64,
    },
    Npc(ActorInstance),
    Item {
        map: MapId,
        position: TilePos,
        stack: ItemStack,
    },
}

impl NetworkedActor {
    pub fn map(&self) -> MapId {
        match self {
            NetworkedActor::Player { map, .. } => *map,
            NetworkedActor::Npc(instance) => instance.map,
            NetworkedActor::Item { map, .. } => *map,
        }
    }

    pub fn position(&self) -> TilePos {
        match self {
            NetworkedActor::Player { position, .. } => *position,
            NetworkedActor::Npc(instance) => instance.position,
            NetworkedActor::Item { position, .. } => *position,
        }
    }

    fn position_mut(&mut self) -> &mut TilePos {
        match self {
            NetworkedActor::Player { position, .. } => position,
            NetworkedActor::Npc(instance) => &mut instance.position,
            NetworkedActor::Item { position, .. } => position,
        }
    }

    pub(crate) fn set_position(&mut self, position: TilePos) {
        *self.position_mut() = position;
    }
}
