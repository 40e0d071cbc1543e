use diesel::prelude::*;

use crate::models::{NewResetToken, NewUser, ResetToken, User};
use crate::schema::{reset_tokens, users};

pub fn find_by_name(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(username))
        .first::<User>(conn)
        .optional()
}

pub fn find_by_id(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Option<User>> {
    users::table
        .filter(users::id.eq(user_id))
        .first::<User>(conn)
        .optional()
}

pub fn insert(conn: &mut SqliteConnection, new_user: &NewUser) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values(new_user)
        .get_result(conn)
}

pub fn update_password(
    conn: &mut SqliteConnection,
    user_id: i32,
    password_digest: &str,
) -> QueryResult<usize> {
    diesel::update(users::table.filter(users::id.eq(user_id)))
        .set((
            users::password_digest.eq(password_digest),
            users::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)
}

/// The most recently issued reset token for a user; token age is evaluated
/// lazily at check time, expired rows are never swept.
pub fn latest_reset_token(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Option<ResetToken>> {
    reset_tokens::table
        .filter(reset_tokens::user_id.eq(user_id))
        .order(reset_tokens::created_at.desc())
        .first::<ResetToken>(conn)
        .optional()
}

pub fn insert_reset_token(
    conn: &mut SqliteConnection,
    new_token: &NewResetToken,
) -> QueryResult<ResetToken> {
    diesel::insert_into(reset_tokens::table)
        .values(new_token)
        .get_result(conn)
}

pub fn delete_reset_token(conn: &mut SqliteConnection, token_id: i32) -> QueryResult<usize> {
    diesel::delete(reset_tokens::table.filter(reset_tokens::id.eq(token_id))).execute(conn)
}
