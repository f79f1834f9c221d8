//! Small worlds and service bundles shared by the unit tests.

use tokio::sync::mpsc::{Receiver, channel};

use crate::{
    ai::Behavior,
    common::{Heading, MapId, ObjectId, TilePos},
    config::Config,
    network::{ClientHandle, ClientId, FromServer},
    services::Services,
    spawn::materialize,
    world::{
        ActorDatabase, ActorInstance, ActorTemplate, GoldRange, LootEntry, LootTable, MapData,
        Origin, RespawnWindow, WorldData,
    },
};

pub const TEST_MAP: MapId = MapId(1);

/// Hostile, drops gold and loot, respawns after exactly `RAT_RESPAWN_SECS`.
pub const RAT: u32 = 10;
pub const RAT_RESPAWN_SECS: u32 = 5;
pub const RAT_LOOT: u32 = 100;
pub const RAT_DEATH_EFFECT: u32 = 77;
/// Hostile but holds its ground.
pub const SENTRY: u32 = 11;
/// Not hostile, and never respawns.
pub const BUNNY: u32 = 12;
/// Drops exactly 10 gold and nothing else, never respawns.
pub const GOBLIN: u32 = 13;

fn template(id: u32, name: &str) -> ActorTemplate {
    ActorTemplate {
        id,
        name: name.to_string(),
        level: 1,
        max_hp: 10,
        hostile: false,
        attackable: true,
        behavior: Behavior::Aggressive,
        attack_damage: 1,
        attack_cooldown_ms: 2000,
        aggro_range: 0,
        respawn_delay: RespawnWindow::default(),
        gold: GoldRange::default(),
        loot_table: None,
        death_effect: None,
    }
}

/// A single open 20x20 map with a wall at (5, 5).
pub fn test_data() -> WorldData {
    let mut data = WorldData::default();

    data.maps = vec![MapData {
        id: TEST_MAP,
        width: 20,
        height: 20,
        blocked: vec![TilePos::new(5, 5)],
    }];

    data.templates = vec![
        ActorTemplate {
            level: 5,
            max_hp: 30,
            hostile: true,
            attack_damage: 4,
            aggro_range: 6,
            respawn_delay: RespawnWindow {
                min: RAT_RESPAWN_SECS,
                max: RAT_RESPAWN_SECS,
            },
            gold: GoldRange { min: 10, max: 10 },
            loot_table: Some(RAT_LOOT),
            death_effect: Some(RAT_DEATH_EFFECT),
            ..template(RAT, "Rat")
        },
        ActorTemplate {
            level: 3,
            max_hp: 50,
            hostile: true,
            behavior: Behavior::Guard,
            attack_damage: 6,
            aggro_range: 4,
            ..template(SENTRY, "Sentry")
        },
        ActorTemplate {
            behavior: Behavior::Passive,
            ..template(BUNNY, "Bunny")
        },
        ActorTemplate {
            level: 5,
            max_hp: 20,
            hostile: true,
            gold: GoldRange { min: 10, max: 10 },
            ..template(GOBLIN, "Goblin")
        },
    ];

    data.loot_tables = vec![LootTable {
        id: RAT_LOOT,
        entries: vec![
            LootEntry {
                item_id: 500,
                probability: 1.0,
                min: 2,
                max: 2,
            },
            LootEntry {
                item_id: 501,
                probability: 0.0,
                min: 1,
                max: 1,
            },
        ],
    }];

    data.reindexed()
}

/// The origin a spawn point for `template_id` at `position` would have.
pub fn test_origin(template_id: u32, position: TilePos) -> Origin {
    let respawn_delay = test_data()
        .template(template_id)
        .map(|template| template.respawn_delay)
        .unwrap_or_default();

    Origin {
        template_id,
        map: TEST_MAP,
        position,
        heading: Heading::South,
        respawn_delay,
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.world.rng_seed = Some(42);
    config.ai.attack_chance = 1.0;
    config.ai.move_chance = 1.0;
    config.respawn.search_radius = 1;
    config.respawn.retry_pause_ms = 1000;
    config.respawn.warn_every = 3;
    config.drops.search_radius = 1;
    config
}

/// Services backed by `test_data()` and an in-memory database.
pub struct TestHarness {
    pub services: Services,
    next_client: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let database = ActorDatabase::in_memory().unwrap();

        Self {
            services: Services::new(config, test_data(), database),
            next_client: 0,
        }
    }

    pub fn origin(&self, template_id: u32, position: TilePos) -> Origin {
        test_origin(template_id, position)
    }

    /// Materializes `template_id` right at `position`.
    pub fn spawn(&self, template_id: u32, position: TilePos) -> ActorInstance {
        materialize(
            &self.services,
            self.origin(template_id, position),
            position,
        )
        .unwrap()
    }

    fn connect(&mut self, actor_id: ObjectId, tile: TilePos) -> Receiver<FromServer> {
        let (send, recv) = channel(256);
        self.next_client += 1;

        let handle = ClientHandle {
            id: ClientId(self.next_client),
            channel: send,
            actor_id,
        };
        self.services
            .network
            .lock()
            .add_client(handle, TEST_MAP, tile);

        recv
    }

    /// Registers a client without an actor of its own, looking at `tile`.
    pub fn observer(&mut self, tile: TilePos) -> Receiver<FromServer> {
        self.connect(ObjectId(0), tile)
    }

    /// Puts a player with 100 HP at `tile`, along with their client.
    pub fn player(&mut self, tile: TilePos) -> (ObjectId, Receiver<FromServer>) {
        let id = self
            .services
            .world
            .lock()
            .insert_player("Tester", TEST_MAP, tile, 1, 100)
            .unwrap();

        (id, self.connect(id, tile))
    }
}

/// Everything currently waiting in `recv`.
pub fn drain(recv: &mut Receiver<FromServer>) -> Vec<FromServer> {
    let mut messages = Vec::new();
    while let Ok(msg) = recv.try_recv() {
        messages.push(msg);
    }
    messages
}
