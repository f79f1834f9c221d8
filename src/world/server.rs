use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::{
    common::{Heading, MapId, ObjectId, TilePos},
    error::PopulationError,
    world::{
        ActorFlags, ActorInstance, ItemStack, NetworkedActor, Origin, WorldData, zone::Zone,
    },
};

/// A player as seen by monsters looking for something to attack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSighting {
    pub id: ObjectId,
    pub position: TilePos,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
}

/// The authoritative in-memory state of every map, actor and item.
#[derive(Default, Debug)]
pub struct WorldServer {
    pub data: WorldData,
    zones: HashMap<MapId, Zone>,
    actors: HashMap<ObjectId, NetworkedActor>,
    occupancy: HashMap<(MapId, TilePos), ObjectId>,
    last_actor_id: u32,
    last_spawn_index: u32,
}

impl WorldServer {
    pub fn new(data: WorldData) -> Self {
        let zones = data
            .maps
            .iter()
            .map(|map| (map.id, Zone::load(map)))
            .collect();

        Self {
            data,
            zones,
            ..Default::default()
        }
    }

    fn generate_actor_id(&mut self) -> ObjectId {
        self.last_actor_id += 1;
        ObjectId(self.last_actor_id)
    }

    fn generate_spawn_index(&mut self) -> u32 {
        self.last_spawn_index = self.last_spawn_index.wrapping_add(1);
        self.last_spawn_index
    }

    pub fn find_zone(&self, map: MapId) -> Option<&Zone> {
        self.zones.get(&map)
    }

    /// Whether `position` is inside the map and not blocked by terrain.
    pub fn can_move_to(&self, map: MapId, position: TilePos) -> bool {
        self.zones
            .get(&map)
            .is_some_and(|zone| zone.is_walkable(position))
    }

    pub fn is_tile_occupied(&self, map: MapId, position: TilePos) -> bool {
        self.occupancy.contains_key(&(map, position))
    }

    pub fn tile_occupant(&self, map: MapId, position: TilePos) -> Option<ObjectId> {
        self.occupancy.get(&(map, position)).copied()
    }

    /// Whether something new could be placed at `position` right now.
    pub fn is_tile_free(&self, map: MapId, position: TilePos) -> bool {
        self.can_move_to(map, position) && !self.is_tile_occupied(map, position)
    }

    pub fn find_actor(&self, id: ObjectId) -> Option<&NetworkedActor> {
        self.actors.get(&id)
    }

    pub fn find_npc(&self, id: ObjectId) -> Option<&ActorInstance> {
        match self.actors.get(&id) {
            Some(NetworkedActor::Npc(instance)) => Some(instance),
            _ => None,
        }
    }

    pub fn find_npc_mut(&mut self, id: ObjectId) -> Option<&mut ActorInstance> {
        match self.actors.get_mut(&id) {
            Some(NetworkedActor::Npc(instance)) => Some(instance),
            _ => None,
        }
    }

    fn insert_actor(&mut self, id: ObjectId, actor: NetworkedActor) {
        self.occupancy.insert((actor.map(), actor.position()), id);
        self.actors.insert(id, actor);
    }

    fn ensure_free(&self, map: MapId, position: TilePos) -> Result<(), PopulationError> {
        if !self.zones.contains_key(&map) {
            return Err(PopulationError::Configuration(format!("Unknown map {map}")));
        }

        if !self.is_tile_free(map, position) {
            return Err(PopulationError::TileUnavailable);
        }

        Ok(())
    }

    /// Creates a new instance of the template described by `origin`, standing at `position`.
    pub fn create_instance(
        &mut self,
        origin: Origin,
        position: TilePos,
    ) -> Result<ActorInstance, PopulationError> {
        let Some(template) = self.data.template(origin.template_id).cloned() else {
            return Err(PopulationError::Configuration(format!(
                "Missing template {}",
                origin.template_id
            )));
        };

        self.ensure_free(origin.map, position)?;

        let mut flags = ActorFlags::NONE;
        flags.set(ActorFlags::HOSTILE, template.hostile);
        flags.set(ActorFlags::ATTACKABLE, template.attackable);

        let instance = ActorInstance {
            id: self.generate_actor_id(),
            template_id: template.id,
            map: origin.map,
            position,
            heading: origin.heading,
            hp: template.max_hp,
            max_hp: template.max_hp,
            level: template.level,
            flags,
            attack_damage: template.attack_damage,
            attack_cooldown: Duration::from_millis(template.attack_cooldown_ms),
            last_attack: None,
            aggro_range: template.aggro_range,
            gold: template.gold,
            loot_table: template.loot_table,
            death_effect: template.death_effect,
            spawn_index: self.generate_spawn_index(),
            origin: Origin {
                respawn_delay: template.respawn_delay,
                ..origin
            },
            dying: false,
        };

        self.insert_actor(instance.id, NetworkedActor::Npc(instance.clone()));

        Ok(instance)
    }

    /// Removes a monster and frees its tile. Returns `None` if it was already gone.
    pub fn remove_instance(&mut self, id: ObjectId) -> Option<ActorInstance> {
        if !matches!(self.actors.get(&id), Some(NetworkedActor::Npc(_))) {
            return None;
        }

        match self.remove_actor(id) {
            Some(NetworkedActor::Npc(instance)) => Some(instance),
            _ => None,
        }
    }

    /// Removes any kind of actor and frees its tile.
    pub fn remove_actor(&mut self, id: ObjectId) -> Option<NetworkedActor> {
        let actor = self.actors.remove(&id)?;

        let key = (actor.map(), actor.position());
        if self.occupancy.get(&key) == Some(&id) {
            self.occupancy.remove(&key);
        }

        Some(actor)
    }

    pub fn insert_player(
        &mut self,
        name: &str,
        map: MapId,
        position: TilePos,
        level: u32,
        max_hp: u32,
    ) -> Result<ObjectId, PopulationError> {
        self.ensure_free(map, position)?;

        let id = self.generate_actor_id();
        self.insert_actor(
            id,
            NetworkedActor::Player {
                name: name.to_string(),
                map,
                position,
                level,
                hp: max_hp,
                max_hp,
                experience: 0,
            },
        );

        Ok(id)
    }

    /// Places a stack of items on the ground.
    pub fn drop_item(
        &mut self,
        map: MapId,
        position: TilePos,
        stack: ItemStack,
    ) -> Result<ObjectId, PopulationError> {
        self.ensure_free(map, position)?;

        let id = self.generate_actor_id();
        self.insert_actor(
            id,
            NetworkedActor::Item {
                map,
                position,
                stack,
            },
        );

        Ok(id)
    }

    /// Moves an actor to `position`, which has to be walkable and unoccupied.
    pub fn set_position(
        &mut self,
        id: ObjectId,
        position: TilePos,
        heading: Option<Heading>,
    ) -> Result<(), PopulationError> {
        let actor = match self.actors.get(&id) {
            Some(NetworkedActor::Npc(instance)) if instance.dying => {
                return Err(PopulationError::InvalidState(id));
            }
            Some(actor) => actor,
            None => return Err(PopulationError::InvalidState(id)),
        };

        let map = actor.map();
        let old_position = actor.position();
        if old_position != position {
            self.ensure_free(map, position)?;
        }

        self.occupancy.remove(&(map, old_position));
        self.occupancy.insert((map, position), id);

        let Some(actor) = self.actors.get_mut(&id) else {
            return Err(PopulationError::InvalidState(id));
        };
        actor.set_position(position);
        if let (NetworkedActor::Npc(instance), Some(heading)) = (actor, heading) {
            instance.heading = heading;
        }

        Ok(())
    }

    /// Subtracts `amount` from the actor's HP, clamping at zero, and returns what's left.
    /// Actors at zero HP can't be damaged any further.
    pub fn apply_damage(&mut self, id: ObjectId, amount: u32) -> Result<u32, PopulationError> {
        let hp = match self.actors.get_mut(&id) {
            Some(NetworkedActor::Player { hp, .. }) => hp,
            Some(NetworkedActor::Npc(instance)) if !instance.dying => &mut instance.hp,
            _ => return Err(PopulationError::InvalidState(id)),
        };

        if *hp == 0 {
            return Err(PopulationError::InvalidState(id));
        }

        *hp = hp.saturating_sub(amount);
        Ok(*hp)
    }

    pub fn record_attack(&mut self, id: ObjectId, at: Instant) {
        if let Some(instance) = self.find_npc_mut(id) {
            instance.last_attack = Some(at);
        }
    }

    /// Marks a monster as dying and returns a snapshot of it.
    /// Only the first caller succeeds, everyone after gets `InvalidState`.
    pub fn claim_death(&mut self, id: ObjectId) -> Result<ActorInstance, PopulationError> {
        let Some(instance) = self.find_npc_mut(id) else {
            return Err(PopulationError::InvalidState(id));
        };

        if instance.dying {
            return Err(PopulationError::InvalidState(id));
        }

        instance.dying = true;
        instance.hp = 0;

        Ok(instance.clone())
    }

    /// Adds experience to a player, and returns their new total.
    pub fn grant_experience(&mut self, id: ObjectId, amount: u32) -> Result<u64, PopulationError> {
        let Some(NetworkedActor::Player { experience, .. }) = self.actors.get_mut(&id) else {
            return Err(PopulationError::InvalidState(id));
        };

        *experience += amount as u64;
        Ok(*experience)
    }

    /// Returns the ids of all living hostile monsters, oldest first.
    pub fn hostile_actors(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .actors
            .iter()
            .filter(|(_, actor)| {
                matches!(actor, NetworkedActor::Npc(instance) if instance.is_hostile() && instance.is_alive())
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn players_on_map(&self, map: MapId) -> Vec<PlayerSighting> {
        self.actors
            .iter()
            .filter_map(|(id, actor)| match actor {
                NetworkedActor::Player {
                    map: player_map,
                    position,
                    level,
                    hp,
                    max_hp,
                    ..
                } if *player_map == map => Some(PlayerSighting {
                    id: *id,
                    position: *position,
                    level: *level,
                    hp: *hp,
                    max_hp: *max_hp,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn items_on_map(&self, map: MapId) -> Vec<(ObjectId, TilePos, ItemStack)> {
        self.actors
            .iter()
            .filter_map(|(id, actor)| match actor {
                NetworkedActor::Item {
                    map: item_map,
                    position,
                    stack,
                } if *item_map == map => Some((*id, *position, *stack)),
                _ => None,
            })
            .collect()
    }

    pub fn npc_count(&self) -> usize {
        self.actors
            .values()
            .filter(|actor| matches!(actor, NetworkedActor::Npc(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RAT, test_data, test_origin};

    #[test]
    fn test_create_instance() {
        let mut world = WorldServer::new(test_data());
        let origin = test_origin(RAT, TilePos::new(2, 2));

        let instance = world.create_instance(origin, TilePos::new(2, 2)).unwrap();
        assert_eq!(instance.hp, instance.max_hp);
        assert!(instance.is_hostile());
        assert_eq!(
            instance.origin.respawn_delay,
            world.data.template(RAT).unwrap().respawn_delay
        );
        assert_eq!(world.tile_occupant(origin.map, TilePos::new(2, 2)), Some(instance.id));

        // The same tile can't hold two actors
        assert_eq!(
            world.create_instance(origin, TilePos::new(2, 2)),
            Err(PopulationError::TileUnavailable)
        );

        // Nor can blocked terrain
        assert_eq!(
            world.create_instance(origin, TilePos::new(5, 5)),
            Err(PopulationError::TileUnavailable)
        );
    }

    #[test]
    fn test_missing_template() {
        let mut world = WorldServer::new(test_data());
        let origin = test_origin(999, TilePos::new(2, 2));

        assert!(matches!(
            world.create_instance(origin, TilePos::new(2, 2)),
            Err(PopulationError::Configuration(_))
        ));
        assert!(!world.is_tile_occupied(origin.map, TilePos::new(2, 2)));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut world = WorldServer::new(test_data());
        let origin = test_origin(RAT, TilePos::new(2, 2));

        let first = world.create_instance(origin, TilePos::new(2, 2)).unwrap();
        assert!(world.remove_instance(first.id).is_some());
        assert!(!world.is_tile_occupied(origin.map, TilePos::new(2, 2)));

        let second = world.create_instance(origin, TilePos::new(2, 2)).unwrap();
        assert_ne!(first.id, second.id);
        assert!(world.remove_instance(first.id).is_none());
    }

    #[test]
    fn test_damage_clamps() {
        let mut world = WorldServer::new(test_data());
        let origin = test_origin(RAT, TilePos::new(2, 2));
        let instance = world.create_instance(origin, TilePos::new(2, 2)).unwrap();

        assert_eq!(world.apply_damage(instance.id, 5), Ok(instance.max_hp - 5));
        assert_eq!(world.apply_damage(instance.id, 10_000), Ok(0));
        assert_eq!(
            world.apply_damage(instance.id, 1),
            Err(PopulationError::InvalidState(instance.id))
        );
        assert_eq!(world.find_npc(instance.id).unwrap().hp, 0);
    }

    #[test]
    fn test_claim_death_once() {
        let mut world = WorldServer::new(test_data());
        let origin = test_origin(RAT, TilePos::new(2, 2));
        let instance = world.create_instance(origin, TilePos::new(2, 2)).unwrap();

        assert!(world.claim_death(instance.id).is_ok());
        assert_eq!(
            world.claim_death(instance.id),
            Err(PopulationError::InvalidState(instance.id))
        );
        assert!(world.hostile_actors().is_empty());

        // Dying monsters stay where they fell
        assert_eq!(
            world.set_position(instance.id, TilePos::new(3, 2), None),
            Err(PopulationError::InvalidState(instance.id))
        );
        assert_eq!(world.tile_occupant(origin.map, TilePos::new(2, 2)), Some(instance.id));
        assert!(!world.is_tile_occupied(origin.map, TilePos::new(3, 2)));
    }

    #[test]
    fn test_set_position() {
        let mut world = WorldServer::new(test_data());
        let map = test_origin(RAT, TilePos::new(0, 0)).map;
        let player = world
            .insert_player("Alice", map, TilePos::new(0, 0), 1, 100)
            .unwrap();
        let other = world
            .insert_player("Bob", map, TilePos::new(1, 0), 1, 100)
            .unwrap();

        assert_eq!(
            world.set_position(player, TilePos::new(1, 0), None),
            Err(PopulationError::TileUnavailable)
        );
        assert!(world.set_position(player, TilePos::new(0, 1), None).is_ok());
        assert_eq!(world.tile_occupant(map, TilePos::new(0, 1)), Some(player));
        assert!(!world.is_tile_occupied(map, TilePos::new(0, 0)));
        assert_eq!(world.tile_occupant(map, TilePos::new(1, 0)), Some(other));
    }
}
