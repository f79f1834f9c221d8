//! Picking the next tile a monster should step on.

use crate::{
    common::{Heading, MapId, TilePos},
    world::WorldServer,
};

/// Answers "where should I step next to get from `from` to `to`".
/// The caller still checks the step is free before taking it.
pub trait Pathfinder: Send + Sync {
    fn next_step(
        &self,
        world: &WorldServer,
        map: MapId,
        from: TilePos,
        to: TilePos,
    ) -> Option<(TilePos, Heading)>;
}

/// Steps straight towards the target, sliding along one axis if the diagonal is blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepTowards;

impl Pathfinder for StepTowards {
    fn next_step(
        &self,
        world: &WorldServer,
        map: MapId,
        from: TilePos,
        to: TilePos,
    ) -> Option<(TilePos, Heading)> {
        let heading = Heading::towards(from, to)?;
        let (dx, dy) = heading.delta();

        let mut candidates = vec![from.offset(dx, dy)];
        if dx != 0 && dy != 0 {
            candidates.push(from.offset(dx, 0));
            candidates.push(from.offset(0, dy));
        }

        // Never step onto the target itself
        candidates
            .into_iter()
            .filter(|step| *step != to)
            .find(|step| world.can_move_to(map, *step))
            .and_then(|step| Heading::towards(from, step).map(|heading| (step, heading)))
    }
}
