//! The observer registry and visibility-scoped broadcasts.

use std::collections::HashMap;

use tokio::sync::mpsc::Sender;

use crate::{
    common::{Heading, MapId, ObjectId, TilePos, chebyshev_distance},
    world::ItemStack,
};

#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct ClientId(pub usize);

impl std::fmt::Debug for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClientId ({})", self.0)
    }
}

/// What an observer needs to know to show a newly spawned monster.
#[derive(Clone, Debug, PartialEq)]
pub struct NpcSpawn {
    pub template_id: u32,
    pub spawn_index: u32,
    pub position: TilePos,
    pub heading: Heading,
    pub hp: u32,
    pub max_hp: u32,
    pub level: u32,
}

/// State changes sent to connected clients. Encoding them for the wire is up to the connection.
#[derive(Clone, Debug, PartialEq)]
pub enum FromServer {
    /// A monster has been spawned.
    ActorSpawn(ObjectId, NpcSpawn),
    /// An actor moved to a new tile.
    ActorMove(ObjectId, TilePos, Heading),
    /// An actor swung at another.
    ActorAttack {
        attacker: ObjectId,
        target: ObjectId,
        damage: u32,
        critical: bool,
        dodged: bool,
    },
    /// An actor's HP changed.
    UpdateHp(ObjectId, u32, u32),
    /// An actor has died, but isn't despawned yet.
    ActorDied(ObjectId),
    /// Play a visual effect on an actor.
    PlayEffect {
        actor_id: ObjectId,
        effect_id: u32,
        looping: bool,
    },
    /// An actor should be despawned.
    DeleteActor(ObjectId),
    /// Items were dropped on the ground.
    ItemDrop(ObjectId, ItemStack, TilePos),
    /// The player gained experience, with their new total.
    ExperienceGained(u32, u64),
    /// A chat-style line only meant for the receiving player.
    SystemMessage(String),
}

#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    pub channel: Sender<FromServer>,
    pub actor_id: ObjectId,
}

impl ClientHandle {
    /// Queues `msg` for this observer without waiting. A full or closed channel is an
    /// error, and the observer is dropped on the next cleanup.
    pub fn send(&mut self, msg: FromServer) -> Result<(), std::io::Error> {
        if self.channel.try_send(msg).is_err() {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Observer is lagging or gone",
            ))
        } else {
            Ok(())
        }
    }
}

/// Where the client last told us it was.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientState {
    pub map: MapId,
    pub tile: TilePos,
}

#[derive(Debug)]
pub struct NetworkState {
    pub to_remove: Vec<ClientId>,
    pub clients: HashMap<ClientId, (ClientHandle, ClientState)>,
    visibility_radius: i32,
}

impl NetworkState {
    pub fn new(visibility_radius: i32) -> Self {
        Self {
            to_remove: Vec::new(),
            clients: HashMap::new(),
            visibility_radius,
        }
    }

    pub fn add_client(&mut self, handle: ClientHandle, map: MapId, tile: TilePos) {
        tracing::info!("Registering observer {:?} on map {map}", handle.id);
        self.clients
            .insert(handle.id, (handle, ClientState { map, tile }));
    }

    /// Updates the last known tile of whichever client controls `actor_id`.
    pub fn update_observer(&mut self, actor_id: ObjectId, map: MapId, tile: TilePos) {
        for (handle, state) in self.clients.values_mut() {
            if handle.actor_id == actor_id {
                *state = ClientState { map, tile };
            }
        }
    }

    /// Sends the `message` to every client on `map` that can see `origin_tile`.
    /// Returns how many clients received it.
    pub fn notify(&mut self, map: MapId, origin_tile: TilePos, message: FromServer) -> usize {
        let mut delivered = 0;

        for (id, (handle, state)) in &mut self.clients {
            // Skip any clients not on our map
            if state.map != map {
                continue;
            }

            if chebyshev_distance(state.tile, origin_tile) > self.visibility_radius {
                continue;
            }

            if handle.send(message.clone()).is_err() {
                self.to_remove.push(*id);
            } else {
                delivered += 1;
            }
        }

        delivered
    }

    /// Sends the `message` to `actor_id`, if they have a client.
    pub fn send_to_by_actor_id(&mut self, actor_id: ObjectId, message: FromServer) {
        for (id, (handle, _)) in &mut self.clients {
            if handle.actor_id == actor_id {
                if handle.send(message).is_err() {
                    self.to_remove.push(*id);
                }
                break;
            }
        }
    }

    /// Drops every client that failed to receive a message since the last call.
    pub fn remove_disconnected(&mut self) -> Vec<ClientId> {
        let mut removed = std::mem::take(&mut self.to_remove);
        removed.sort_by_key(|id| id.0);
        removed.dedup();

        for id in &removed {
            if self.clients.remove(id).is_some() {
                tracing::info!("Removing observer {id:?} since it stopped listening");
            }
        }

        removed
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new(crate::common::VISIBILITY_RADIUS)
    }
}
