use crate::schema::{packages, versions};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::Serialize;

// Package model - one row per package name, pointing at its latest version
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Package {
    pub id: i32,
    pub name: String,
    pub descriptor: Option<String>,
    pub author_id: Option<i32>,
    pub latest_version_id: Option<i32>,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = packages)]
pub struct NewPackage {
    pub name: String,
    pub descriptor: Option<String>,
    pub author_id: Option<i32>,
    pub latest_version_id: Option<i32>,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewPackage {
    pub fn new(name: String, author_id: Option<i32>, creator_id: i32) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            name,
            descriptor: None,
            author_id,
            latest_version_id: None,
            creator_id,
            modifier_id: creator_id,
            created_at: now,
            updated_at: now,
        }
    }
}

// Version model - one row per published (package, version) pair
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Version {
    pub id: i32,
    pub package_id: i32,
    pub version: String,
    pub descriptor: String,
    pub filename: String,
    pub filesize: i64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = versions)]
pub struct NewVersion {
    pub package_id: i32,
    pub version: String,
    pub descriptor: String,
    pub filename: String,
    pub filesize: i64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub creator_id: i32,
    pub modifier_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[allow(clippy::too_many_arguments)]
impl NewVersion {
    pub fn new(
        package_id: i32,
        version: String,
        descriptor: String,
        filename: String,
        filesize: i64,
        checksums: &crate::storage::Checksums,
        creator_id: i32,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            package_id,
            version,
            descriptor,
            filename,
            filesize,
            md5: checksums.md5.clone(),
            sha1: checksums.sha1.clone(),
            sha256: checksums.sha256.clone(),
            creator_id,
            modifier_id: creator_id,
            created_at: now,
            updated_at: now,
        }
    }
}
