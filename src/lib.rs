//! Keeps the monster population of a tile-based multiplayer world alive: hostile AI,
//! death handling, respawns and the broadcasts that go along with them.

/// Hostile monster behavior and the tick driver.
pub mod ai;

/// Melee resolution and damage application.
pub mod combat;

/// Common types and constants used everywhere.
pub mod common;

/// Configuration loaded from `config.yaml`.
pub mod config;

/// The death pipeline.
pub mod death;

/// The error type shared by every operation.
pub mod error;

/// Observers and visibility-scoped broadcasts.
pub mod network;

/// Single steps towards a target.
pub mod pathfinding;

/// Searching for free tiles.
pub mod placement;

/// Timed, cancellable respawns.
pub mod respawn;

/// Shared state handles.
pub mod services;

/// Initial population and materializing instances.
pub mod spawn;

/// The world state, its static data and persistence.
pub mod world;

#[cfg(test)]
mod test_support;
