use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{
    DROP_SEARCH_RADIUS, EXPERIENCE_PER_LEVEL, RESPAWN_RETRY_PAUSE, RESPAWN_SEARCH_RADIUS,
    TICK_INTERVAL, VISIBILITY_RADIUS,
};

/// Configuration for the world simulation itself.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorldConfig {
    /// How often the tick driver runs, in milliseconds.
    #[serde(default = "WorldConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Location of the YAML file describing maps, templates, loot tables and spawn points.
    #[serde(default = "WorldConfig::default_data_path")]
    pub data_path: String,
    /// Location of the SQLite database that persists live actors.
    #[serde(default = "WorldConfig::default_database_path")]
    pub database_path: String,
    /// Fixes the random number generator, only useful for debugging.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            data_path: Self::default_data_path(),
            database_path: Self::default_database_path(),
            rng_seed: None,
        }
    }
}

impl WorldConfig {
    /// Returns the tick interval as a `Duration`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn default_tick_interval_ms() -> u64 {
        TICK_INTERVAL.as_millis() as u64
    }

    fn default_data_path() -> String {
        "resources/data/world.yaml".to_string()
    }

    fn default_database_path() -> String {
        "population.db".to_string()
    }
}

/// Configuration for hostile monster behavior.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AiConfig {
    /// Chance (0.0 to 1.0) that an adjacent monster swings when its cooldown is up.
    #[serde(default = "AiConfig::default_attack_chance")]
    pub attack_chance: f32,
    /// Chance (0.0 to 1.0) that a monster steps towards its target on a given tick.
    #[serde(default = "AiConfig::default_move_chance")]
    pub move_chance: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            attack_chance: Self::default_attack_chance(),
            move_chance: Self::default_move_chance(),
        }
    }
}

impl AiConfig {
    fn default_attack_chance() -> f32 {
        0.8
    }

    fn default_move_chance() -> f32 {
        0.9
    }
}

/// Configuration for state change broadcasts.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VisibilityConfig {
    /// Observers further than this (in tiles) won't hear about changes.
    #[serde(default = "VisibilityConfig::default_radius")]
    pub radius: i32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            radius: Self::default_radius(),
        }
    }
}

impl VisibilityConfig {
    fn default_radius() -> i32 {
        VISIBILITY_RADIUS
    }
}

/// Configuration for the respawn scheduler.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RespawnConfig {
    /// How far away from its origin a monster may respawn.
    #[serde(default = "RespawnConfig::default_search_radius")]
    pub search_radius: i32,
    /// Pause between attempts when no tile could be claimed, in milliseconds.
    #[serde(default = "RespawnConfig::default_retry_pause_ms")]
    pub retry_pause_ms: u64,
    /// A warning is logged every time this many attempts have failed in a row.
    #[serde(default = "RespawnConfig::default_warn_every")]
    pub warn_every: u32,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            search_radius: Self::default_search_radius(),
            retry_pause_ms: Self::default_retry_pause_ms(),
            warn_every: Self::default_warn_every(),
        }
    }
}

impl RespawnConfig {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    fn default_search_radius() -> i32 {
        RESPAWN_SEARCH_RADIUS
    }

    fn default_retry_pause_ms() -> u64 {
        RESPAWN_RETRY_PAUSE.as_millis() as u64
    }

    fn default_warn_every() -> u32 {
        10
    }
}

/// Configuration for rewards handed out when monsters die.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DropConfig {
    /// How far away from the corpse gold and loot may land.
    #[serde(default = "DropConfig::default_search_radius")]
    pub search_radius: i32,
    /// Experience granted per level of the defeated monster.
    #[serde(default = "DropConfig::default_experience_per_level")]
    pub experience_per_level: u32,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            search_radius: Self::default_search_radius(),
            experience_per_level: Self::default_experience_per_level(),
        }
    }
}

impl DropConfig {
    fn default_search_radius() -> i32 {
        DROP_SEARCH_RADIUS
    }

    fn default_experience_per_level() -> u32 {
        EXPERIENCE_PER_LEVEL
    }
}

/// Everything read from `config.yaml`. Missing sections and fields keep their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub visibility: VisibilityConfig,

    #[serde(default)]
    pub respawn: RespawnConfig,

    #[serde(default)]
    pub drops: DropConfig,
}

pub fn get_config() -> Config {
    if let Ok(data) = std::fs::read_to_string("config.yaml") {
        serde_yaml_ng::from_str(&data).expect("Failed to parse")
    } else {
        Config::default()
    }
}
