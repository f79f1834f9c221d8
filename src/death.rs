//! What happens when a monster is defeated.

use crate::{
    common::{GOLD_ITEM_ID, ObjectId},
    error::PopulationError,
    network::FromServer,
    placement::find_free_tile,
    services::Services,
    world::{ActorInstance, ItemStack},
};

/// How the monster was killed, only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathReason {
    Melee,
    Ability,
    Environment,
}

/// Experience handed to whoever kills a monster of `level`.
pub fn experience_reward(services: &Services, level: u32) -> u32 {
    level * services.config.drops.experience_per_level
}

/// Runs the death pipeline for the monster `actor_id`: rewards `killer`, drops its gold
/// and loot, despawns it and schedules its respawn.
///
/// Only the first call for an instance does anything. Later ones (or calls for monsters
/// that don't exist) return `InvalidState` without side effects.
pub fn handle_death(
    services: &Services,
    actor_id: ObjectId,
    killer: ObjectId,
    reward: u32,
    reason: DeathReason,
) -> Result<(), PopulationError> {
    let actor = services.world.lock().claim_death(actor_id)?;

    tracing::info!(
        "Actor {actor_id} (template {}) was killed by {killer} ({reason:?})",
        actor.template_id
    );

    // So nobody keeps treating it as alive until it's despawned
    services.network.lock().notify(
        actor.map,
        actor.position,
        FromServer::ActorDied(actor_id),
    );

    grant_experience(services, killer, reward);
    drop_gold(services, &actor);
    drop_loot(services, &actor);

    if services.world.lock().remove_instance(actor_id).is_none() {
        tracing::debug!("Actor {actor_id} was despawned while dying");
        return Ok(());
    }

    {
        let mut network = services.network.lock();
        if let Some(effect_id) = actor.death_effect {
            network.notify(
                actor.map,
                actor.position,
                FromServer::PlayEffect {
                    actor_id,
                    effect_id,
                    looping: false,
                },
            );
        }
        network.notify(
            actor.map,
            actor.position,
            FromServer::DeleteActor(actor_id),
        );
    }

    if let Err(err) = services.database.delete_actor(actor_id) {
        tracing::warn!("Failed to delete persisted actor {actor_id}: {err}");
    }

    services.respawns.schedule(services, actor.origin);

    Ok(())
}

fn grant_experience(services: &Services, killer: ObjectId, reward: u32) {
    let total = match services.world.lock().grant_experience(killer, reward) {
        Ok(total) => total,
        Err(err) => {
            tracing::debug!("Not granting experience to {killer}: {err}");
            return;
        }
    };

    services
        .network
        .lock()
        .send_to_by_actor_id(killer, FromServer::ExperienceGained(reward, total));
}

fn drop_gold(services: &Services, actor: &ActorInstance) {
    let range = actor.gold;
    if range.max == 0 {
        return;
    }

    let amount = services.rng.lock().u32(range.min.min(range.max)..=range.max);
    if amount == 0 {
        return;
    }

    let stack = ItemStack {
        item_id: GOLD_ITEM_ID,
        quantity: amount,
    };
    if let Err(err) = drop_stack(services, actor, stack) {
        tracing::debug!("Couldn't drop {amount} gold for {}: {err}", actor.id);
    }
}

fn drop_loot(services: &Services, actor: &ActorInstance) {
    let Some(table) = actor.loot_table else {
        return;
    };

    let entries = services.world.lock().data.loot_entries(table).to_vec();
    for entry in entries {
        let quantity = {
            let mut rng = services.rng.lock();
            if rng.f32() >= entry.probability {
                continue;
            }
            rng.u32(entry.min.min(entry.max)..=entry.max)
        };

        if quantity == 0 {
            continue;
        }

        let stack = ItemStack {
            item_id: entry.item_id,
            quantity,
        };
        if let Err(err) = drop_stack(services, actor, stack) {
            tracing::debug!(
                "Couldn't drop item {} for {}: {err}",
                entry.item_id,
                actor.id
            );
        }
    }
}

/// Puts `stack` on a free tile near the dead monster and shows it to everyone around.
fn drop_stack(
    services: &Services,
    actor: &ActorInstance,
    stack: ItemStack,
) -> Result<ObjectId, PopulationError> {
    let (id, tile) = {
        let mut world = services.world.lock();
        let tile = {
            let mut rng = services.rng.lock();
            find_free_tile(
                &world,
                &mut rng,
                actor.map,
                actor.position,
                services.config.drops.search_radius,
            )
        }
        .ok_or(PopulationError::PlacementExhausted)?;

        (world.drop_item(actor.map, tile, stack)?, tile)
    };

    services
        .network
        .lock()
        .notify(actor.map, tile, FromServer::ItemDrop(id, stack, tile));

    Ok(id)
}
