use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::Config,
    error::PopulationError,
    network::NetworkState,
    respawn::RespawnScheduler,
    world::{ActorDatabase, WorldData, WorldServer},
};

/// Shared handles every part of the population core works with.
/// Cloning is cheap, everything inside is reference counted.
#[derive(Clone)]
pub struct Services {
    pub world: Arc<Mutex<WorldServer>>,
    pub network: Arc<Mutex<NetworkState>>,
    pub database: Arc<ActorDatabase>,
    pub respawns: RespawnScheduler,
    pub rng: Arc<Mutex<fastrand::Rng>>,
    pub config: Arc<Config>,
}

impl Services {
    pub fn new(config: Config, data: WorldData, database: ActorDatabase) -> Self {
        let rng = match config.world.rng_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Self {
            world: Arc::new(Mutex::new(WorldServer::new(data))),
            network: Arc::new(Mutex::new(NetworkState::new(config.visibility.radius))),
            database: Arc::new(database),
            respawns: RespawnScheduler::default(),
            rng: Arc::new(Mutex::new(rng)),
            config: Arc::new(config),
        }
    }

    /// Sets up everything from the configured data and database paths.
    pub fn from_config(config: Config) -> Result<Self, PopulationError> {
        let data = WorldData::load(&config.world.data_path)?;
        let database = ActorDatabase::open(&config.world.database_path)?;

        let stale = database.clear()?;
        if stale > 0 {
            tracing::info!("Discarded {stale} monsters left over from the last run");
        }

        Ok(Self::new(config, data, database))
    }
}
