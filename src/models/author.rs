use crate::schema::{authors, package_authors, package_owners};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::Serialize;

pub const ROLE_CONTRIBUTOR: &str = "contributor";
pub const ROLE_MAINTAINER: &str = "maintainer";

// Author model - identity is the (name, email) pair; the same name with a
// different email is a distinct author
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = authors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub web: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = authors)]
pub struct NewAuthor {
    pub name: String,
    pub email: Option<String>,
    pub web: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewAuthor {
    pub fn new(name: String, email: Option<String>, web: Option<String>) -> Self {
        Self {
            name,
            email,
            web,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

impl Author {
    /// Lowercased hex MD5 of the trimmed email, as used by avatar services.
    pub fn gravatar_hash(&self) -> Option<String> {
        use md5::{Digest, Md5};

        self.email.as_ref().map(|email| {
            let mut hasher = Md5::new();
            hasher.update(email.trim().to_lowercase().as_bytes());
            hex::encode(hasher.finalize())
        })
    }
}

// Join row tying an author to a package in a given role
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = package_authors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PackageAuthor {
    pub id: i32,
    pub package_id: i32,
    pub author_id: i32,
    pub role: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = package_authors)]
pub struct NewPackageAuthor {
    pub package_id: i32,
    pub author_id: i32,
    pub role: String,
}

// Ownership row - the users allowed to publish and manage a package
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = package_owners)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PackageOwner {
    pub id: i32,
    pub package_id: i32,
    pub user_id: i32,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = package_owners)]
pub struct NewPackageOwner {
    pub package_id: i32,
    pub user_id: i32,
    pub creator_id: i32,
    pub created_at: NaiveDateTime,
}

impl NewPackageOwner {
    pub fn new(package_id: i32, user_id: i32, creator_id: i32) -> Self {
        Self {
            package_id,
            user_id,
            creator_id,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
