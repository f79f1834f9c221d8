//! Finding somewhere to put newly materialized monsters and dropped items.

use crate::{
    common::{MapId, PLACEMENT_ATTEMPTS, TilePos},
    world::WorldServer,
};

/// Looks for a tile around `center` that is inside the map, not blocked and not occupied.
/// The center itself is tried first, then up to `PLACEMENT_ATTEMPTS` random tiles in the
/// `(2 * radius + 1)` square around it.
pub fn find_free_tile(
    world: &WorldServer,
    rng: &mut fastrand::Rng,
    map: MapId,
    center: TilePos,
    radius: i32,
) -> Option<TilePos> {
    if world.is_tile_free(map, center) {
        return Some(center);
    }

    let radius = radius.max(0);
    if radius == 0 {
        return None;
    }

    for _ in 0..PLACEMENT_ATTEMPTS {
        let candidate = center.offset(rng.i32(-radius..=radius), rng.i32(-radius..=radius));
        if world.is_tile_free(map, candidate) {
            return Some(candidate);
        }
    }

    tracing::debug!(
        "No free tile within {radius} of {center:?} on map {map} after {PLACEMENT_ATTEMPTS} attempts"
    );

    None
}
