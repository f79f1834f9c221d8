use std::collections::HashMap;

use serde::Deserialize;

use crate::{
    ai::Behavior,
    common::{Heading, MapId, TilePos},
    error::PopulationError,
    world::{GoldRange, RespawnWindow},
};

/// Layout of a single map.
#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    pub id: MapId,
    pub width: i32,
    pub height: i32,
    /// Tiles that can never be walked on, like walls or water.
    #[serde(default)]
    pub blocked: Vec<TilePos>,
}

/// Static data every instance of a monster is created from.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorTemplate {
    pub id: u32,
    pub name: String,
    pub level: u32,
    pub max_hp: u32,
    #[serde(default)]
    pub hostile: bool,
    #[serde(default = "ActorTemplate::default_attackable")]
    pub attackable: bool,
    #[serde(default)]
    pub behavior: Behavior,
    pub attack_damage: u32,
    #[serde(default = "ActorTemplate::default_attack_cooldown_ms")]
    pub attack_cooldown_ms: u64,
    #[serde(default)]
    pub aggro_range: i32,
    #[serde(default)]
    pub respawn_delay: RespawnWindow,
    #[serde(default)]
    pub gold: GoldRange,
    #[serde(default)]
    pub loot_table: Option<u32>,
    /// Effect played once when this monster dies.
    #[serde(default)]
    pub death_effect: Option<u32>,
}

impl ActorTemplate {
    fn default_attackable() -> bool {
        true
    }

    fn default_attack_cooldown_ms() -> u64 {
        2000
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct LootEntry {
    pub item_id: u32,
    /// Chance (0.0 to 1.0) this entry drops at all.
    pub probability: f32,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LootTable {
    pub id: u32,
    #[serde(default)]
    pub entries: Vec<LootEntry>,
}

/// Where the initial population is placed on startup.
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnPoint {
    pub template_id: u32,
    pub map: MapId,
    pub position: TilePos,
    #[serde(default)]
    pub heading: Heading,
}

/// Maps, templates, loot tables and spawn points making up the world.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldData {
    #[serde(default)]
    pub maps: Vec<MapData>,
    #[serde(default)]
    pub templates: Vec<ActorTemplate>,
    #[serde(default)]
    pub loot_tables: Vec<LootTable>,
    #[serde(default)]
    pub spawns: Vec<SpawnPoint>,
    #[serde(skip)]
    template_index: HashMap<u32, usize>,
    #[serde(skip)]
    loot_index: HashMap<u32, usize>,
}

impl WorldData {
    /// Reads the world data from a YAML file at `path`.
    pub fn load(path: &str) -> Result<Self, PopulationError> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            PopulationError::Configuration(format!("Failed to read {path}: {err}"))
        })?;

        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self, PopulationError> {
        let data: WorldData = serde_yaml_ng::from_str(data)
            .map_err(|err| PopulationError::Configuration(err.to_string()))?;

        Ok(data.reindexed())
    }

    /// Rebuilds the lookup tables, needed after modifying the lists directly.
    pub fn reindexed(mut self) -> Self {
        self.template_index = self
            .templates
            .iter()
            .enumerate()
            .map(|(i, template)| (template.id, i))
            .collect();
        self.loot_index = self
            .loot_tables
            .iter()
            .enumerate()
            .map(|(i, table)| (table.id, i))
            .collect();
        self
    }

    pub fn template(&self, id: u32) -> Option<&ActorTemplate> {
        self.template_index
            .get(&id)
            .and_then(|i| self.templates.get(*i))
    }

    /// Returns the entries of a loot table, or nothing if it doesn't exist.
    pub fn loot_entries(&self, id: u32) -> &[LootEntry] {
        self.loot_index
            .get(&id)
            .and_then(|i| self.loot_tables.get(*i))
            .map(|table| table.entries.as_slice())
            .unwrap_or_default()
    }
}
