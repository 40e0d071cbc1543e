pub mod authors;
pub mod connection;
pub mod log;
pub mod owners;
pub mod packages;
pub mod service;
pub mod users;
pub mod versions;

pub use connection::{DbConnection, DbPool};
pub use service::DatabaseService;
