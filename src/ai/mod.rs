//! Hostile monster behavior, driven once per world tick.

use std::{sync::Arc, time::Instant};

use tokio::task::JoinHandle;

use crate::{
    combat::{Combatant, CombatResolver, StandardMelee},
    common::{ObjectId, chebyshev_distance},
    error::PopulationError,
    network::FromServer,
    pathfinding::{Pathfinder, StepTowards},
    services::Services,
    world::{ActorInstance, PlayerSighting},
};

mod behavior;
pub use behavior::{Behavior, BehaviorRegistry};

/// Decides what each hostile monster does on a tick.
pub struct AiController {
    behaviors: BehaviorRegistry,
    pathfinder: Box<dyn Pathfinder>,
    combat: Box<dyn CombatResolver>,
}

impl AiController {
    pub fn new(
        behaviors: BehaviorRegistry,
        pathfinder: Box<dyn Pathfinder>,
        combat: Box<dyn CombatResolver>,
    ) -> Self {
        Self {
            behaviors,
            pathfinder,
            combat,
        }
    }

    /// Behaviors from the loaded templates, straight-line pathing and standard melee rules.
    pub fn standard(services: &Services) -> Self {
        let behaviors = BehaviorRegistry::from_templates(&services.world.lock().data.templates);
        let combat = StandardMelee::new(services.rng.lock().fork());

        Self::new(behaviors, Box::new(StepTowards), Box::new(combat))
    }

    /// Runs one tick for the monster `actor_id`: attack an adjacent target, or step towards one.
    pub fn process_tick(
        &self,
        services: &Services,
        actor_id: ObjectId,
    ) -> Result<(), PopulationError> {
        let now = tokio::time::Instant::now().into_std();

        let (actor, target, behavior) = {
            let world = services.world.lock();
            let Some(actor) = world.find_npc(actor_id) else {
                return Err(PopulationError::InvalidState(actor_id));
            };

            if !actor.is_hostile() || !actor.is_alive() {
                return Ok(());
            }

            let behavior = self.behaviors.get(actor.template_id);
            if !behavior.attacks() {
                return Ok(());
            }

            let Some(target) = nearest_target(actor, &world.players_on_map(actor.map)) else {
                return Ok(());
            };

            (actor.clone(), target, behavior)
        };

        if chebyshev_distance(actor.position, target.position) <= 1 {
            if !actor.cooldown_elapsed(now) || !roll(services, services.config.ai.attack_chance) {
                return Ok(());
            }

            self.attack(services, &actor, &target, now)
        } else if behavior.pursues() {
            if !roll(services, services.config.ai.move_chance) {
                return Ok(());
            }

            self.advance(services, &actor, &target)
        } else {
            Ok(())
        }
    }

    fn attack(
        &self,
        services: &Services,
        actor: &ActorInstance,
        target: &PlayerSighting,
        now: Instant,
    ) -> Result<(), PopulationError> {
        let defender = Combatant {
            id: target.id,
            level: target.level,
            attack_damage: 0,
        };
        let outcome = self.combat.resolve_melee(&Combatant::from(actor), &defender);

        let (name, remaining) = {
            let mut world = services.world.lock();

            // The monster may have been killed while the swing was being resolved
            if !world.find_npc(actor.id).is_some_and(ActorInstance::is_alive) {
                tracing::debug!("Actor {} died before its attack landed", actor.id);
                return Ok(());
            }

            world.record_attack(actor.id, now);

            let name = world
                .data
                .template(actor.template_id)
                .map(|template| template.name.clone())
                .unwrap_or_else(|| "monster".to_string());

            let remaining = if outcome.is_dodged {
                None
            } else {
                Some(world.apply_damage(target.id, outcome.damage)?)
            };

            (name, remaining)
        };

        let mut network = services.network.lock();
        network.notify(
            actor.map,
            actor.position,
            FromServer::ActorAttack {
                attacker: actor.id,
                target: target.id,
                damage: if outcome.is_dodged { 0 } else { outcome.damage },
                critical: outcome.is_critical,
                dodged: outcome.is_dodged,
            },
        );

        let Some(remaining) = remaining else {
            network.send_to_by_actor_id(
                target.id,
                FromServer::SystemMessage(format!("You dodge the {name}'s attack.")),
            );
            return Ok(());
        };

        network.notify(
            actor.map,
            target.position,
            FromServer::UpdateHp(target.id, remaining, target.max_hp),
        );

        let message = if outcome.is_critical {
            format!("The {name} critically hits you for {} damage.", outcome.damage)
        } else {
            format!("The {name} hits you for {} damage.", outcome.damage)
        };
        network.send_to_by_actor_id(target.id, FromServer::SystemMessage(message));

        if remaining == 0 {
            // Reviving and returning home is up to the player's own session
            network.notify(actor.map, target.position, FromServer::ActorDied(target.id));
            network.send_to_by_actor_id(
                target.id,
                FromServer::SystemMessage(format!("You were defeated by the {name}.")),
            );
            tracing::info!("Player {} was defeated by actor {}", target.id, actor.id);
        }

        Ok(())
    }

    fn advance(
        &self,
        services: &Services,
        actor: &ActorInstance,
        target: &PlayerSighting,
    ) -> Result<(), PopulationError> {
        let moved = {
            let mut world = services.world.lock();
            if !world.find_npc(actor.id).is_some_and(ActorInstance::is_alive) {
                return Ok(());
            }

            let Some((step, heading)) =
                self.pathfinder
                    .next_step(&world, actor.map, actor.position, target.position)
            else {
                return Ok(());
            };

            if chebyshev_distance(step, actor.position) != 1 || !world.is_tile_free(actor.map, step) {
                tracing::debug!("Actor {} can't step onto {step:?}", actor.id);
                return Ok(());
            }

            world.set_position(actor.id, step, Some(heading))?;
            world.find_npc(actor.id).cloned()
        };

        let Some(moved) = moved else {
            return Err(PopulationError::InvalidState(actor.id));
        };

        services.network.lock().notify(
            moved.map,
            moved.position,
            FromServer::ActorMove(moved.id, moved.position, moved.heading),
        );

        services.database.update_actor(&moved)
    }
}

/// The closest living player within aggro range. Equally close players are broken by lowest id.
fn nearest_target(actor: &ActorInstance, players: &[PlayerSighting]) -> Option<PlayerSighting> {
    players
        .iter()
        .filter(|player| player.hp > 0)
        .map(|player| (chebyshev_distance(actor.position, player.position), player))
        .filter(|(distance, _)| *distance <= actor.aggro_range)
        .min_by_key(|(distance, player)| (*distance, player.id))
        .map(|(_, player)| *player)
}

fn roll(services: &Services, chance: f32) -> bool {
    services.rng.lock().f32() < chance
}

/// Ticks every hostile monster once, oldest first, and returns how many failed.
/// Failures are logged here and never stop the other monsters from acting.
pub fn run_tick(services: &Services, controller: &AiController) -> usize {
    let mut failures = 0;

    let actors = services.world.lock().hostile_actors();
    for actor_id in actors {
        let Err(err) = controller.process_tick(services, actor_id) else {
            continue;
        };

        failures += 1;
        match err {
            PopulationError::InvalidState(_) => {
                tracing::debug!("Skipping tick for {actor_id}: {err}")
            }
            PopulationError::Configuration(_) => {
                tracing::error!("Tick for {actor_id} failed: {err}")
            }
            _ => tracing::warn!("Tick for {actor_id} failed: {err}"),
        }
    }

    services.network.lock().remove_disconnected();

    failures
}

/// Starts the recurring world tick that drives every hostile monster.
pub fn spawn_tick_driver(services: Services, controller: Arc<AiController>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(services.config.world.tick_interval());
        interval.tick().await;
        loop {
            interval.tick().await;

            run_tick(&services, &controller);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        combat::MeleeOutcome,
        common::{MapId, TilePos},
        test_support::{RAT, SENTRY, TestHarness, drain},
        world::NetworkedActor,
    };

    struct Fixed(MeleeOutcome);

    impl CombatResolver for Fixed {
        fn resolve_melee(&self, _: &Combatant, _: &Combatant) -> MeleeOutcome {
            self.0
        }
    }

    /// Always wants to step onto a fixed tile.
    struct Stubborn(TilePos);

    impl Pathfinder for Stubborn {
        fn next_step(
            &self,
            _: &crate::world::WorldServer,
            _: MapId,
            from: TilePos,
            _: TilePos,
        ) -> Option<(TilePos, crate::common::Heading)> {
            crate::common::Heading::towards(from, self.0).map(|heading| (self.0, heading))
        }
    }

    fn controller(harness: &TestHarness, damage: u32) -> AiController {
        let behaviors = BehaviorRegistry::from_templates(&harness.services.world.lock().data.templates);
        AiController::new(
            behaviors,
            Box::new(StepTowards),
            Box::new(Fixed(MeleeOutcome {
                damage,
                ..Default::default()
            })),
        )
    }

    fn hp(harness: &TestHarness, id: ObjectId) -> u32 {
        match harness.services.world.lock().find_actor(id) {
            Some(NetworkedActor::Player { hp, .. }) => *hp,
            _ => panic!("{id} is not a player"),
        }
    }

    fn position(harness: &TestHarness, id: ObjectId) -> TilePos {
        harness.services.world.lock().find_npc(id).unwrap().position
    }

    #[test]
    fn test_nearest_target_tie_break() {
        let harness = TestHarness::new();
        let rat = harness.spawn(RAT, TilePos::new(10, 10));

        let sighting = |id: u32, x: i32, y: i32, hp: u32| PlayerSighting {
            id: ObjectId(id),
            position: TilePos::new(x, y),
            level: 1,
            hp,
            max_hp: 100,
        };

        let players = [
            sighting(40, 12, 10, 100),
            sighting(30, 8, 8, 100),
            sighting(20, 11, 11, 0),
            sighting(50, 10, 16, 100),
        ];
        assert_eq!(nearest_target(&rat, &players).unwrap().id, ObjectId(30));

        // Out of aggro range
        assert!(nearest_target(&rat, &[sighting(1, 10, 17, 100)]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attack_adjacent_player() {
        let mut harness = TestHarness::new();
        let controller = controller(&harness, 7);
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (player, mut client) = harness.player(TilePos::new(11, 10));

        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(hp(&harness, player), 93);

        let messages = drain(&mut client);
        assert!(messages.contains(&FromServer::ActorAttack {
            attacker: rat.id,
            target: player,
            damage: 7,
            critical: false,
            dodged: false,
        }));
        assert!(messages.contains(&FromServer::UpdateHp(player, 93, 100)));
        assert!(messages.iter().any(|msg| matches!(msg, FromServer::SystemMessage(_))));

        // Still cooling down
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(hp(&harness, player), 93);

        tokio::time::advance(Duration::from_millis(2000)).await;
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(hp(&harness, player), 86);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_only_reaches_defender() {
        let mut harness = TestHarness::new();
        let controller = controller(&harness, 7);
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (_, mut defender) = harness.player(TilePos::new(11, 10));
        let mut bystander = harness.observer(TilePos::new(10, 11));

        controller.process_tick(&harness.services, rat.id).unwrap();

        assert!(drain(&mut defender).iter().any(|msg| matches!(msg, FromServer::SystemMessage(_))));
        assert!(!drain(&mut bystander).iter().any(|msg| matches!(msg, FromServer::SystemMessage(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lethal_hit_on_player() {
        let mut harness = TestHarness::new();
        let controller = controller(&harness, 500);
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (player, mut client) = harness.player(TilePos::new(11, 10));

        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(hp(&harness, player), 0);
        assert!(drain(&mut client).contains(&FromServer::ActorDied(player)));

        // Dead players aren't targets anymore
        tokio::time::advance(Duration::from_millis(2000)).await;
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert!(drain(&mut client).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chase() {
        let mut harness = TestHarness::new();
        let controller = controller(&harness, 1);
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (player, _) = harness.player(TilePos::new(14, 10));
        let mut observer = harness.observer(TilePos::new(11, 10));

        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(position(&harness, rat.id), TilePos::new(11, 10));
        assert_eq!(
            drain(&mut observer),
            vec![FromServer::ActorMove(
                rat.id,
                TilePos::new(11, 10),
                crate::common::Heading::East
            )]
        );
        assert_eq!(
            harness.services.database.find_actor(rat.id).unwrap().unwrap().position,
            TilePos::new(11, 10)
        );

        controller.process_tick(&harness.services, rat.id).unwrap();
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(position(&harness, rat.id), TilePos::new(13, 10));

        // Adjacent now, so the next tick is an attack rather than a step
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(position(&harness, rat.id), TilePos::new(13, 10));
        assert_eq!(hp(&harness, player), 99);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_step_is_silent() {
        let mut harness = TestHarness::new();
        let behaviors = BehaviorRegistry::from_templates(&harness.services.world.lock().data.templates);
        let wall = AiController::new(
            behaviors,
            Box::new(Stubborn(TilePos::new(5, 5))),
            Box::new(Fixed(MeleeOutcome::default())),
        );
        let rat = harness.spawn(RAT, TilePos::new(4, 4));
        harness.player(TilePos::new(8, 8));
        let mut observer = harness.observer(TilePos::new(4, 4));

        assert!(wall.process_tick(&harness.services, rat.id).is_ok());
        assert_eq!(position(&harness, rat.id), TilePos::new(4, 4));
        assert!(drain(&mut observer).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_and_passive() {
        let mut harness = TestHarness::new();
        let mut controller = controller(&harness, 3);
        let sentry = harness.spawn(SENTRY, TilePos::new(10, 10));
        let rat = harness.spawn(RAT, TilePos::new(2, 2));
        let (player, _) = harness.player(TilePos::new(12, 10));
        let (bystander, _) = harness.player(TilePos::new(2, 3));

        // Guards hold their ground
        controller.process_tick(&harness.services, sentry.id).unwrap();
        assert_eq!(position(&harness, sentry.id), TilePos::new(10, 10));

        harness
            .services
            .world
            .lock()
            .set_position(player, TilePos::new(11, 10), None)
            .unwrap();
        controller.process_tick(&harness.services, sentry.id).unwrap();
        assert_eq!(hp(&harness, player), 97);

        // Passive monsters leave even adjacent players alone
        controller.behaviors.register(RAT, Behavior::Passive);
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(hp(&harness, bystander), 100);
        assert_eq!(position(&harness, rat.id), TilePos::new(2, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_ignores_dead_and_unknown() {
        let mut harness = TestHarness::new();
        let controller = controller(&harness, 3);
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (player, _) = harness.player(TilePos::new(11, 10));

        harness.services.world.lock().claim_death(rat.id).unwrap();
        controller.process_tick(&harness.services, rat.id).unwrap();
        assert_eq!(hp(&harness, player), 100);

        assert_eq!(
            controller.process_tick(&harness.services, ObjectId(999)),
            Err(PopulationError::InvalidState(ObjectId(999)))
        );
    }

    /// Kills the attacking monster while its swing is being worked out.
    struct Ambush {
        services: Services,
        victim: ObjectId,
    }

    impl CombatResolver for Ambush {
        fn resolve_melee(&self, _: &Combatant, _: &Combatant) -> MeleeOutcome {
            crate::death::handle_death(
                &self.services,
                self.victim,
                ObjectId(0),
                0,
                crate::death::DeathReason::Ability,
            )
            .unwrap();

            MeleeOutcome {
                damage: 50,
                ..Default::default()
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_killed_mid_swing() {
        let mut harness = TestHarness::new();
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (player, mut client) = harness.player(TilePos::new(11, 10));

        let behaviors = BehaviorRegistry::from_templates(&harness.services.world.lock().data.templates);
        let controller = AiController::new(
            behaviors,
            Box::new(StepTowards),
            Box::new(Ambush {
                services: harness.services.clone(),
                victim: rat.id,
            }),
        );

        controller.process_tick(&harness.services, rat.id).unwrap();

        assert_eq!(hp(&harness, player), 100);
        assert!(harness.services.world.lock().find_npc(rat.id).is_none());

        let messages = drain(&mut client);
        assert!(messages.contains(&FromServer::DeleteActor(rat.id)));
        assert!(!messages.iter().any(|msg| matches!(msg, FromServer::ActorAttack { .. })));
        assert!(!messages.iter().any(|msg| matches!(msg, FromServer::SystemMessage(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_keeps_going() {
        let mut harness = TestHarness::new();
        let controller = Arc::new(controller(&harness, 1));
        let rat = harness.spawn(RAT, TilePos::new(10, 10));
        let (player, client) = harness.player(TilePos::new(11, 10));

        // A client that stopped listening doesn't stop the monsters
        drop(client);

        let driver = spawn_tick_driver(harness.services.clone(), controller);
        let tick = harness.services.config.world.tick_interval();
        tokio::time::sleep(tick * 2 + tick / 2).await;

        assert!(hp(&harness, player) < 100);
        assert!(harness.services.network.lock().clients.is_empty());
        assert!(harness.services.world.lock().find_npc(rat.id).is_some());

        driver.abort();
    }
}
