use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};

use crate::{
    common::{Heading, MapId, ObjectId, TilePos},
    error::PopulationError,
    world::ActorInstance,
};

/// The fields of a live monster that survive in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedActor {
    pub id: ObjectId,
    pub template_id: u32,
    pub map: MapId,
    pub position: TilePos,
    pub heading: Heading,
    pub hp: u32,
    pub max_hp: u32,
}

pub struct ActorDatabase {
    connection: Mutex<Connection>,
}

impl ActorDatabase {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &str) -> Result<Self, PopulationError> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    /// Creates a database that only lives as long as this object.
    pub fn in_memory() -> Result<Self, PopulationError> {
        let connection = Connection::open_in_memory()?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, PopulationError> {
        // Create actors table
        {
            let query = "CREATE TABLE IF NOT EXISTS actors (id INTEGER PRIMARY KEY, template_id INTEGER, map INTEGER, pos_x INTEGER, pos_y INTEGER, heading INTEGER, hp INTEGER, max_hp INTEGER);";
            connection.execute(query, ())?;
        }

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Removes every row, since instances from a previous run are never restored.
    /// Returns how many were removed.
    pub fn clear(&self) -> Result<usize, PopulationError> {
        let connection = self.connection.lock();
        Ok(connection.execute("DELETE FROM actors;", ())?)
    }

    pub fn create_actor(&self, actor: &ActorInstance) -> Result<(), PopulationError> {
        let connection = self.connection.lock();

        connection.execute(
            "INSERT INTO actors VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            (
                actor.id.0,
                actor.template_id,
                actor.map.0,
                actor.position.x,
                actor.position.y,
                actor.heading.as_u8(),
                actor.hp,
                actor.max_hp,
            ),
        )?;

        Ok(())
    }

    pub fn update_actor(&self, actor: &ActorInstance) -> Result<(), PopulationError> {
        let connection = self.connection.lock();

        connection.execute(
            "UPDATE actors SET pos_x = ?1, pos_y = ?2, heading = ?3, hp = ?4 WHERE id = ?5;",
            (
                actor.position.x,
                actor.position.y,
                actor.heading.as_u8(),
                actor.hp,
                actor.id.0,
            ),
        )?;

        Ok(())
    }

    pub fn delete_actor(&self, id: ObjectId) -> Result<(), PopulationError> {
        let connection = self.connection.lock();
        connection.execute("DELETE FROM actors WHERE id = ?1;", (id.0,))?;

        Ok(())
    }

    pub fn find_actor(&self, id: ObjectId) -> Result<Option<PersistedActor>, PopulationError> {
        let connection = self.connection.lock();

        let mut stmt = connection.prepare(
            "SELECT template_id, map, pos_x, pos_y, heading, hp, max_hp FROM actors WHERE id = ?1",
        )?;
        let actor = stmt
            .query_row((id.0,), |row| {
                let heading: u8 = row.get(4)?;
                Ok(PersistedActor {
                    id,
                    template_id: row.get(0)?,
                    map: MapId(row.get(1)?),
                    position: TilePos::new(row.get(2)?, row.get(3)?),
                    heading: Heading::from_u8(heading).unwrap_or_default(),
                    hp: row.get(5)?,
                    max_hp: row.get(6)?,
                })
            })
            .optional()?;

        Ok(actor)
    }

    pub fn count_actors(&self) -> Result<usize, PopulationError> {
        let connection = self.connection.lock();
        let count: i64 = connection.query_row("SELECT COUNT(*) FROM actors", (), |row| row.get(0))?;

        Ok(count as usize)
    }
}
