use crate::common::ObjectId;

/// Everything that can go wrong while keeping the population alive.
/// None of these are fatal to the server, see the tick driver and respawn loop for how each is handled.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulationError {
    /// Persistence or network hiccup, the operation is simply tried again later.
    TransientIo(String),
    /// No free tile was found within the search budget.
    PlacementExhausted,
    /// The world refused to place something on the requested tile.
    TileUnavailable,
    /// The actor was already removed or is dead.
    InvalidState(ObjectId),
    /// Template or map data is missing.
    Configuration(String),
}

impl std::fmt::Display for PopulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PopulationError::TransientIo(message) => write!(f, "Transient I/O error: {message}"),
            PopulationError::PlacementExhausted => write!(f, "No free tile could be found"),
            PopulationError::TileUnavailable => write!(f, "Tile is occupied or blocked"),
            PopulationError::InvalidState(id) => {
                write!(f, "Actor {id} is no longer alive or present")
            }
            PopulationError::Configuration(message) => {
                write!(f, "Configuration error: {message}")
            }
        }
    }
}

impl std::error::Error for PopulationError {}

impl From<rusqlite::Error> for PopulationError {
    fn from(err: rusqlite::Error) -> Self {
        PopulationError::TransientIo(err.to_string())
    }
}

impl From<std::io::Error> for PopulationError {
    fn from(err: std::io::Error) -> Self {
        PopulationError::TransientIo(err.to_string())
    }
}
