use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::models::{LogEntry, LogEntryType, NewLogEntry};
use crate::schema::log_entries;

pub fn append(conn: &mut SqliteConnection, entry: &NewLogEntry) -> QueryResult<LogEntry> {
    diesel::insert_into(log_entries::table)
        .values(entry)
        .get_result(conn)
}

pub fn for_package(conn: &mut SqliteConnection, package_name: &str) -> QueryResult<Vec<LogEntry>> {
    log_entries::table
        .filter(log_entries::package_name.eq(package_name))
        .order(log_entries::created_at.asc())
        .load(conn)
}

/// Names of packages removed entirely (delete entries with no version)
/// since the given date. Feeds the `/updates` removed list.
pub fn removed_package_names_since(
    conn: &mut SqliteConnection,
    since: NaiveDateTime,
) -> QueryResult<Vec<String>> {
    log_entries::table
        .filter(log_entries::entry_type.eq(LogEntryType::Delete as i32))
        .filter(log_entries::version.is_null())
        .filter(log_entries::created_at.gt(since))
        .select(log_entries::package_name)
        .distinct()
        .load(conn)
}
