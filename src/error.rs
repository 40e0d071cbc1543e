use log::error;
use rocket::response::{Responder, Response};
use rocket::{Request, http::Status};
use std::io::Cursor;

/// Error taxonomy for all registry operations. Callers branch on the
/// variant, the HTTP layer maps it to a status code.
#[derive(Debug)]
pub enum RegistryError {
    Validation(String),
    Authentication(String),
    Conflict(String),
    NotFound(String),
    Storage(String),
    Database(String),
    Index(String),
    Internal(String),
}

impl RegistryError {
    pub fn message(&self) -> &str {
        match self {
            RegistryError::Validation(msg)
            | RegistryError::Authentication(msg)
            | RegistryError::Conflict(msg)
            | RegistryError::NotFound(msg)
            | RegistryError::Storage(msg)
            | RegistryError::Database(msg)
            | RegistryError::Index(msg)
            | RegistryError::Internal(msg) => msg,
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RegistryError {}

impl<'r> Responder<'r, 'static> for RegistryError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let (status, message) = match self {
            RegistryError::Validation(msg) => (Status::BadRequest, msg),
            RegistryError::Conflict(msg) => (Status::BadRequest, msg),
            RegistryError::Authentication(msg) => (Status::Forbidden, msg),
            RegistryError::NotFound(msg) => (Status::NotFound, msg),
            // Internal detail must not leak past the 500 boundary
            RegistryError::Storage(msg)
            | RegistryError::Database(msg)
            | RegistryError::Index(msg)
            | RegistryError::Internal(msg) => {
                error!("Internal error: {msg}");
                (
                    Status::InternalServerError,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "message": message }).to_string();
        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl From<diesel::result::Error> for RegistryError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => {
                RegistryError::NotFound("Record not found".to_string())
            }
            other => RegistryError::Database(format!("Database error: {other}")),
        }
    }
}

impl From<diesel::r2d2::PoolError> for RegistryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RegistryError::Database(format!("Connection pool error: {err}"))
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Storage(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Internal(format!("Serialization error: {err}"))
    }
}

impl From<tantivy::TantivyError> for RegistryError {
    fn from(err: tantivy::TantivyError) -> Self {
        RegistryError::Index(format!("Search index error: {err}"))
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for RegistryError {
    fn from(err: tantivy::directory::error::OpenDirectoryError) -> Self {
        RegistryError::Index(format!("Search index error: {err}"))
    }
}
