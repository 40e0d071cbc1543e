use crate::schema::log_entries;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::Serialize;

/// Audit log entry type. Stored as an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryType {
    Add = 1,
    Update = 2,
    Delete = 3,
}

impl LogEntryType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(LogEntryType::Add),
            2 => Some(LogEntryType::Update),
            3 => Some(LogEntryType::Delete),
            _ => None,
        }
    }
}

// Append-only audit record; a NULL version means the whole package
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = log_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LogEntry {
    pub id: i32,
    pub entry_type: i32,
    pub package_name: String,
    pub version: Option<String>,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = log_entries)]
pub struct NewLogEntry {
    pub entry_type: i32,
    pub package_name: String,
    pub version: Option<String>,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

impl NewLogEntry {
    pub fn new(
        entry_type: LogEntryType,
        package_name: String,
        version: Option<String>,
        user_id: i32,
    ) -> Self {
        Self {
            entry_type: entry_type as i32,
            package_name,
            version,
            user_id,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
