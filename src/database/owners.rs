use diesel::prelude::*;

use crate::models::{NewPackageOwner, User};
use crate::schema::{package_owners, users};

pub fn is_owner(conn: &mut SqliteConnection, package_id: i32, user_id: i32) -> QueryResult<bool> {
    let count: i64 = package_owners::table
        .filter(package_owners::package_id.eq(package_id))
        .filter(package_owners::user_id.eq(user_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

pub fn owners_of(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<Vec<User>> {
    package_owners::table
        .inner_join(users::table.on(users::id.eq(package_owners::user_id)))
        .filter(package_owners::package_id.eq(package_id))
        .select(User::as_select())
        .order(users::username.asc())
        .load(conn)
}

pub fn count_for_package(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<i64> {
    package_owners::table
        .filter(package_owners::package_id.eq(package_id))
        .count()
        .get_result(conn)
}

pub fn add(
    conn: &mut SqliteConnection,
    package_id: i32,
    user_id: i32,
    creator_id: i32,
) -> QueryResult<usize> {
    let ownership = NewPackageOwner::new(package_id, user_id, creator_id);
    diesel::insert_into(package_owners::table)
        .values(&ownership)
        .execute(conn)
}

pub fn remove(conn: &mut SqliteConnection, package_id: i32, user_id: i32) -> QueryResult<usize> {
    diesel::delete(
        package_owners::table
            .filter(package_owners::package_id.eq(package_id))
            .filter(package_owners::user_id.eq(user_id)),
    )
    .execute(conn)
}

pub fn delete_for_package(conn: &mut SqliteConnection, package_id: i32) -> QueryResult<usize> {
    diesel::delete(package_owners::table.filter(package_owners::package_id.eq(package_id)))
        .execute(conn)
}
