use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::models::{NewPackage, Package};
use crate::schema::packages;

/// Package row operations. All of these take an explicit connection so the
/// orchestrator can run them inside a single transaction.
pub fn find_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Package>> {
    packages::table
        .filter(packages::name.eq(name))
        .first::<Package>(conn)
        .optional()
}

pub fn find_by_id(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<Option<Package>> {
    packages::table
        .filter(packages::id.eq(package_id))
        .first::<Package>(conn)
        .optional()
}

pub fn all(conn: &mut SqliteConnection) -> QueryResult<Vec<Package>> {
    packages::table.order(packages::name.asc()).load(conn)
}

pub fn updated_since(
    conn: &mut SqliteConnection,
    since: NaiveDateTime,
) -> QueryResult<Vec<Package>> {
    packages::table
        .filter(packages::updated_at.gt(since))
        .order(packages::name.asc())
        .load(conn)
}

pub fn insert(conn: &mut SqliteConnection, new_package: &NewPackage) -> QueryResult<Package> {
    diesel::insert_into(packages::table)
        .values(new_package)
        .get_result(conn)
}

pub fn set_latest_version(
    conn: &mut SqliteConnection,
    package_id: i32,
    version_id: Option<i32>,
) -> QueryResult<usize> {
    diesel::update(packages::table.filter(packages::id.eq(package_id)))
        .set(packages::latest_version_id.eq(version_id))
        .execute(conn)
}

pub fn set_descriptor(
    conn: &mut SqliteConnection,
    package_id: i32,
    descriptor: &str,
) -> QueryResult<usize> {
    diesel::update(packages::table.filter(packages::id.eq(package_id)))
        .set(packages::descriptor.eq(descriptor))
        .execute(conn)
}

/// Bumps the modification timestamp and records the acting user.
pub fn touch(conn: &mut SqliteConnection, package_id: i32, modifier_id: i32) -> QueryResult<usize> {
    diesel::update(packages::table.filter(packages::id.eq(package_id)))
        .set((
            packages::updated_at.eq(chrono::Utc::now().naive_utc()),
            packages::modifier_id.eq(modifier_id),
        ))
        .execute(conn)
}

pub fn delete(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<usize> {
    diesel::delete(packages::table.filter(packages::id.eq(package_id))).execute(conn)
}
