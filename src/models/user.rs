use crate::schema::{reset_tokens, users};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rocket::serde::Serialize;

// User authentication models. The password digest is produced client-side
// with the stored salt; the server only compares digests byte for byte.
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    #[serde(skip_serializing)]
    pub salt: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub password_digest: String,
    pub salt: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewUser {
    pub fn new(username: String, password_digest: String, salt: String, email: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            username,
            password_digest,
            salt,
            email,
            created_at: now,
            updated_at: now,
        }
    }
}

// Password reset token, valid for 24 hours from creation and consumed on use
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = reset_tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ResetToken {
    pub id: i32,
    pub user_id: i32,
    pub token_hash: String,
    pub created_at: NaiveDateTime,
}

pub const RESET_TOKEN_TTL_SECS: i64 = 86_400;

impl ResetToken {
    pub fn is_valid(&self, user_id: i32, token_str: &str) -> bool {
        let age = chrono::Utc::now().naive_utc() - self.created_at;
        age.num_seconds() < RESET_TOKEN_TTL_SECS
            && self.user_id == user_id
            && self.token_hash == token_str
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = reset_tokens)]
pub struct NewResetToken {
    pub user_id: i32,
    pub token_hash: String,
    pub created_at: NaiveDateTime,
}

impl NewResetToken {
    pub fn new(user_id: i32) -> Self {
        Self {
            user_id,
            token_hash: uuid::Uuid::new_v4().simple().to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
