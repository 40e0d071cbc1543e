use super::connection::{DbConnection, DbPool, create_pool, get_connection_with_retry};
use crate::error::RegistryError;

/// Owns the connection pool. Query and mutation logic lives in the sibling
/// operation modules, which take an explicit connection so callers decide
/// the transaction boundary.
#[derive(Debug)]
pub struct DatabaseService {
    pub pool: DbPool,
}

impl DatabaseService {
    /// Creates a new DatabaseService with an initialized connection pool
    pub fn new(database_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = create_pool(database_url)?;
        Ok(Self { pool })
    }

    /// Gets a connection from the pool with retry logic
    pub fn get_connection(&self) -> Result<DbConnection, RegistryError> {
        get_connection_with_retry(&self.pool).map_err(RegistryError::from)
    }
}
