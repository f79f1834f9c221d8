//! Bringing defeated monsters back after a delay.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
    error::PopulationError,
    placement::find_free_tile,
    services::Services,
    spawn::announce,
    world::{ActorInstance, Origin, OriginKey},
};

/// A pending respawn. Sending on (or dropping) `cancel` stops the task behind it.
#[derive(Debug)]
struct RespawnTimer {
    generation: u64,
    attempts: u32,
    cancel: oneshot::Sender<()>,
}

/// What a single respawn attempt ended up doing.
#[derive(Debug, PartialEq)]
enum Attempt {
    Spawned,
    Retry,
    Stop,
}

/// Owns at most one pending respawn per origin.
#[derive(Debug, Clone, Default)]
pub struct RespawnScheduler {
    timers: Arc<Mutex<HashMap<OriginKey, RespawnTimer>>>,
    last_generation: Arc<AtomicU64>,
}

impl RespawnScheduler {
    /// Schedules `origin` to respawn after a random delay from its respawn window,
    /// replacing any respawn already pending for it. Does nothing if the window is empty.
    pub fn schedule(&self, services: &Services, origin: Origin) {
        let window = origin.respawn_delay;
        if window.is_disabled() {
            tracing::debug!(
                "Template {} on map {} doesn't respawn",
                origin.template_id,
                origin.map
            );
            return;
        }

        let seconds = services.rng.lock().u32(window.min.min(window.max)..=window.max);

        tracing::info!(
            "Template {} at {:?} on map {} respawns in {seconds} seconds",
            origin.template_id,
            origin.position,
            origin.map
        );

        self.start(services, origin, Duration::from_secs(seconds as u64));
    }

    /// Keeps trying to place `origin` every retry pause until there is room for it.
    /// Used for spawn points that couldn't be populated, so the respawn window doesn't apply.
    pub fn retry_placement(&self, services: &Services, origin: Origin) {
        self.start(services, origin, services.config.respawn.retry_pause());
    }

    fn start(&self, services: &Services, origin: Origin, delay: Duration) {
        let generation = self.last_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel, cancelled) = oneshot::channel();

        {
            let mut timers = self.timers.lock();
            let timer = RespawnTimer {
                generation,
                attempts: 0,
                cancel,
            };
            if let Some(old) = timers.insert(origin.key(), timer) {
                tracing::debug!(
                    "Replacing pending respawn of template {} at {:?}",
                    origin.template_id,
                    origin.position
                );
                let _ = old.cancel.send(());
            }
        }

        tokio::spawn(run_timer(
            services.clone(),
            origin,
            generation,
            delay,
            cancelled,
        ));
    }

    /// Discards the pending respawn for `origin`, returning whether there was one.
    pub fn cancel(&self, origin: &Origin) -> bool {
        let Some(timer) = self.timers.lock().remove(&origin.key()) else {
            return false;
        };

        let _ = timer.cancel.send(());
        true
    }

    /// Discards every pending respawn, used when shutting down. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let timers: Vec<RespawnTimer> = self.timers.lock().drain().map(|(_, timer)| timer).collect();
        let count = timers.len();

        for timer in timers {
            let _ = timer.cancel.send(());
        }

        if count > 0 {
            tracing::info!("Cancelled {count} pending respawns");
        }

        count
    }

    pub fn pending_count(&self) -> usize {
        self.timers.lock().len()
    }

    /// How many times the pending respawn for `origin` has tried and failed to place itself.
    pub fn attempts(&self, origin: &Origin) -> Option<u32> {
        self.timers
            .lock()
            .get(&origin.key())
            .map(|timer| timer.attempts)
    }

    /// Tries to materialize `origin` once, if the timer behind `generation` is still current.
    fn attempt(&self, services: &Services, origin: &Origin, generation: u64) -> Attempt {
        let attempts = {
            let mut timers = self.timers.lock();
            let Some(timer) = timers
                .get_mut(&origin.key())
                .filter(|timer| timer.generation == generation)
            else {
                return Attempt::Stop;
            };

            timer.attempts += 1;
            timer.attempts
        };

        match self.respawn_once(services, origin, generation) {
            Ok(Some(instance)) => {
                announce(services, &instance);
                tracing::info!(
                    "Respawned template {} as actor {} at {:?}",
                    origin.template_id,
                    instance.id,
                    instance.position
                );
                Attempt::Spawned
            }
            Ok(None) => Attempt::Stop,
            Err(PopulationError::Configuration(message)) => {
                let mut timers = self.timers.lock();
                if timers
                    .get(&origin.key())
                    .is_some_and(|timer| timer.generation == generation)
                {
                    timers.remove(&origin.key());
                }
                tracing::error!(
                    "Giving up on respawning template {}: {message}",
                    origin.template_id
                );
                Attempt::Stop
            }
            Err(err) => {
                let warn_every = services.config.respawn.warn_every.max(1);
                if attempts % warn_every == 0 {
                    tracing::warn!(
                        "Still unable to respawn template {} at {:?} after {attempts} attempts: {err}",
                        origin.template_id,
                        origin.position
                    );
                } else {
                    tracing::debug!(
                        "Respawn attempt {attempts} for template {} failed: {err}",
                        origin.template_id
                    );
                }
                Attempt::Retry
            }
        }
    }

    /// Creates the instance in the world and retires the timer in one step under the timer lock,
    /// so a cancelled or replaced timer never creates anything. Returns `None` in that case.
    /// Persisting and announcing the instance is left to the caller.
    fn respawn_once(
        &self,
        services: &Services,
        origin: &Origin,
        generation: u64,
    ) -> Result<Option<ActorInstance>, PopulationError> {
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
        }
        .ok_or(PopulationError::PlacementExhausted)?;

        let key = origin.key();
        let mut timers = self.timers.lock();
        if !timers
            .get(&key)
            .is_some_and(|timer| timer.generation == generation)
        {
            return Ok(None);
        }

        // Someone else may have taken the tile by now, in which case the world refuses it
        let instance = services.world.lock().create_instance(*origin, tile)?;
        timers.remove(&key);

        Ok(Some(instance))
    }
}

async fn run_timer(
    services: Services,
    origin: Origin,
    generation: u64,
    delay: Duration,
    mut cancelled: oneshot::Receiver<()>,
) {
    tokio::select! {
        biased;
        _ = &mut cancelled => return,
        _ = tokio::time::sleep(delay) => {}
    }

    let scheduler = services.respawns.clone();
    let retry_pause = services.config.respawn.retry_pause();

    loop {
        if scheduler.attempt(&services, &origin, generation) != Attempt::Retry {
            return;
        }

        tokio::select! {
            biased;
            _ = &mut cancelled => return,
            _ = tokio::time::sleep(retry_pause) => {}
        }
    }
}
