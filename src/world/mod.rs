//! The in-memory world, its static data and persistence of live monsters.

mod actor;
pub use actor::{
    ActorFlags, ActorInstance, GoldRange, ItemStack, NetworkedActor, Origin, OriginKey,
    RespawnWindow,
};

mod data;
pub use data::{ActorTemplate, LootEntry, LootTable, MapData, SpawnPoint, WorldData};

mod database;
pub use database::{ActorDatabase, PersistedActor};

mod server;
pub use server::{PlayerSighting, WorldServer};

mod zone;
pub use zone::Zone;
