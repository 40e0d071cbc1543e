use diesel::prelude::*;

use crate::models::{NewVersion, Version};
use crate::schema::versions;
use crate::storage::Checksums;

pub fn find(
    conn: &mut SqliteConnection,
    package_id: i32,
    version: &str,
) -> QueryResult<Option<Version>> {
    versions::table
        .filter(versions::package_id.eq(package_id))
        .filter(versions::version.eq(version))
        .first::<Version>(conn)
        .optional()
}

pub fn find_by_id(conn: &mut SqliteConnection, version_id: i32) -> QueryResult<Option<Version>> {
    versions::table
        .filter(versions::id.eq(version_id))
        .first::<Version>(conn)
        .optional()
}

pub fn by_package(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<Vec<Version>> {
    versions::table
        .filter(versions::package_id.eq(package_id))
        .load(conn)
}

pub fn count_for_package(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<i64> {
    versions::table
        .filter(versions::package_id.eq(package_id))
        .count()
        .get_result(conn)
}

pub fn insert(conn: &mut SqliteConnection, new_version: &NewVersion) -> QueryResult<Version> {
    diesel::insert_into(versions::table)
        .values(new_version)
        .get_result(conn)
}

/// Force-republish: overwrites the stored descriptor, archive metadata and
/// checksums of an existing version in place.
pub fn overwrite(
    conn: &mut SqliteConnection,
    version_id: i32,
    descriptor: &str,
    filename: &str,
    filesize: i64,
    checksums: &Checksums,
    modifier_id: i32,
) -> QueryResult<Version> {
    diesel::update(versions::table.filter(versions::id.eq(version_id)))
        .set((
            versions::descriptor.eq(descriptor),
            versions::filename.eq(filename),
            versions::filesize.eq(filesize),
            versions::md5.eq(&checksums.md5),
            versions::sha1.eq(&checksums.sha1),
            versions::sha256.eq(&checksums.sha256),
            versions::modifier_id.eq(modifier_id),
            versions::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .get_result(conn)
}

pub fn delete(conn: &mut SqliteConnection, version_id: i32) -> QueryResult<usize> {
    diesel::delete(versions::table.filter(versions::id.eq(version_id))).execute(conn)
}

pub fn delete_for_package(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<usize> {
    diesel::delete(versions::table.filter(versions::package_id.eq(package_id))).execute(conn)
}
