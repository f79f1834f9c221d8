//! Bringing monsters into the world.

use crate::{
    common::TilePos,
    error::PopulationError,
    network::{FromServer, NpcSpawn},
    placement::find_free_tile,
    services::Services,
    world::{ActorInstance, Origin, SpawnPoint},
};

/// Creates a new instance from `origin` at `position`, persists it and tells everyone nearby.
/// Fails without side effects if the world refuses the tile.
pub fn materialize(
    services: &Services,
    origin: Origin,
    position: TilePos,
) -> Result<ActorInstance, PopulationError> {
    let instance = services.world.lock().create_instance(origin, position)?;
    announce(services, &instance);

    Ok(instance)
}

/// Persists an instance that was just created in the world and shows it to everyone nearby.
pub(crate) fn announce(services: &Services, instance: &ActorInstance) {
    if let Err(err) = services.database.create_actor(instance) {
        tracing::warn!("Failed to persist actor {}: {err}", instance.id);
    }

    let msg = FromServer::ActorSpawn(
        instance.id,
        NpcSpawn {
            template_id: instance.template_id,
            spawn_index: instance.spawn_index,
            position: instance.position,
            heading: instance.heading,
            hp: instance.hp,
            max_hp: instance.max_hp,
            level: instance.level,
        },
    );
    services
        .network
        .lock()
        .notify(instance.map, instance.position, msg);

    tracing::debug!(
        "Spawned actor {} (template {}) at {:?} on map {}",
        instance.id,
        instance.template_id,
        instance.position,
        instance.map
    );
}

/// Builds the origin for a spawn point, pulling the respawn window from its template.
pub fn origin_for(services: &Services, spawn: &SpawnPoint) -> Result<Origin, PopulationError> {
    let world = services.world.lock();
    let Some(template) = world.data.template(spawn.template_id) else {
        return Err(PopulationError::Configuration(format!(
            "Spawn point at {:?} on map {} uses missing template {}",
            spawn.position, spawn.map, spawn.template_id
        )));
    };

    if world.find_zone(spawn.map).is_none() {
        return Err(PopulationError::Configuration(format!(
            "Spawn point for template {} is on missing map {}",
            spawn.template_id, spawn.map
        )));
    }

    Ok(Origin {
        template_id: spawn.template_id,
        map: spawn.map,
        position: spawn.position,
        heading: spawn.heading,
        respawn_delay: template.respawn_delay,
    })
}

/// Places the initial population from the world data's spawn points, and returns how many were spawned.
/// Spawn points whose area is full keep retrying through the respawn scheduler, even for
/// templates that never respawn.
pub fn spawn_population(services: &Services) -> usize {
    let spawns = services.world.lock().data.spawns.clone();
    let mut spawned = 0;

    for spawn in &spawns {
        let origin = match origin_for(services, spawn) {
            Ok(origin) => origin,
            Err(err) => {
                tracing::error!("{err}");
                continue;
            }
        };

        let tile = {
            let world = services.world.lock();
            let mut rng = services.rng.lock();
            find_free_tile(
                &world,
                &mut rng,
                origin.map,
                origin.position,
                services.config.respawn.search_radius,
            )
        };

        let result = match tile {
            Some(tile) => materialize(services, origin, tile),
            None => Err(PopulationError::PlacementExhausted),
        };

        match result {
            Ok(_) => spawned += 1,
            Err(PopulationError::Configuration(message)) => {
                tracing::error!("Unable to spawn template {}: {message}", origin.template_id);
            }
            Err(err) => {
                tracing::warn!(
                    "Unable to spawn template {} at {:?}: {err}, trying again in {:?}",
                    origin.template_id,
                    origin.position,
                    services.config.respawn.retry_pause()
                );
                services.respawns.retry_placement(services, origin);
            }
        }
    }

    tracing::info!("Spawned {spawned} of {} monsters", spawns.len());

    spawned
}
