//! Melee resolution and damage application.

use parking_lot::Mutex;

use crate::{
    common::ObjectId,
    death::{DeathReason, experience_reward, handle_death},
    error::PopulationError,
    network::FromServer,
    services::Services,
    world::ActorInstance,
};

/// The side of a melee exchange the resolver needs to know about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combatant {
    pub id: ObjectId,
    pub level: u32,
    pub attack_damage: u32,
}

impl From<&ActorInstance> for Combatant {
    fn from(instance: &ActorInstance) -> Self {
        Self {
            id: instance.id,
            level: instance.level,
            attack_damage: instance.attack_damage,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeleeOutcome {
    pub damage: u32,
    pub is_critical: bool,
    pub is_dodged: bool,
}

/// Decides how a single melee swing turns out.
pub trait CombatResolver: Send + Sync {
    fn resolve_melee(&self, attacker: &Combatant, defender: &Combatant) -> MeleeOutcome;
}

/// Flat damage with a small random bonus, and fixed dodge and critical chances.
#[derive(Debug)]
pub struct StandardMelee {
    rng: Mutex<fastrand::Rng>,
    pub dodge_chance: f32,
    pub critical_chance: f32,
}

impl StandardMelee {
    pub fn new(rng: fastrand::Rng) -> Self {
        Self {
            rng: Mutex::new(rng),
            dodge_chance: 0.05,
            critical_chance: 0.1,
        }
    }
}

impl Default for StandardMelee {
    fn default() -> Self {
        Self::new(fastrand::Rng::new())
    }
}

impl CombatResolver for StandardMelee {
    fn resolve_melee(&self, attacker: &Combatant, defender: &Combatant) -> MeleeOutcome {
        let mut rng = self.rng.lock();

        // Higher level defenders get out of the way a little more often
        let level_gap = defender.level.saturating_sub(attacker.level) as f32;
        if rng.f32() < self.dodge_chance + level_gap * 0.01 {
            return MeleeOutcome {
                is_dodged: true,
                ..Default::default()
            };
        }

        let mut damage = attacker.attack_damage + rng.u32(0..=attacker.level / 2);
        let is_critical = rng.f32() < self.critical_chance;
        if is_critical {
            damage *= 2;
        }

        MeleeOutcome {
            damage: damage.max(1),
            is_critical,
            is_dodged: false,
        }
    }
}

/// Deals `damage` to the monster `target` on behalf of `attacker`, and returns its remaining HP.
/// The death pipeline runs if this was the lethal blow.
pub fn strike_actor(
    services: &Services,
    attacker: ObjectId,
    target: ObjectId,
    damage: u32,
    reason: DeathReason,
) -> Result<u32, PopulationError> {
    let (remaining, instance) = {
        let mut world = services.world.lock();
        match world.find_npc(target) {
            Some(instance) if instance.is_attackable() && instance.is_alive() => {}
            _ => return Err(PopulationError::InvalidState(target)),
        }

        let remaining = world.apply_damage(target, damage)?;
        let Some(instance) = world.find_npc(target).cloned() else {
            return Err(PopulationError::InvalidState(target));
        };

        (remaining, instance)
    };

    services.network.lock().notify(
        instance.map,
        instance.position,
        FromServer::UpdateHp(target, remaining, instance.max_hp),
    );

    tracing::debug!("{attacker} hit {target} for {damage}, {remaining} HP left");

    if remaining == 0 {
        let reward = experience_reward(services, instance.level);
        handle_death(services, target, attacker, reward, reason)?;
    }

    Ok(remaining)
}
