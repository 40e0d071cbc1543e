use std::collections::HashSet;

use diesel::prelude::*;
use log::info;

use crate::descriptor::AuthorInfo;
use crate::models::{Author, NewAuthor, NewPackageAuthor};
use crate::schema::{authors, package_authors};

/// Looks up an author by its identity key. Identity is the (name, email)
/// pair; an absent email only ever matches rows with a NULL email, so two
/// authors sharing a name but not an email address stay distinct.
pub fn find_by_identity(
    conn: &mut SqliteConnection,
    name: &str,
    email: Option<&str>,
) -> QueryResult<Option<Author>> {
    match email.filter(|e| !e.is_empty()) {
        Some(email) => authors::table
            .filter(authors::name.eq(name))
            .filter(authors::email.eq(email))
            .first::<Author>(conn)
            .optional(),
        None => authors::table
            .filter(authors::name.eq(name))
            .filter(authors::email.is_null())
            .first::<Author>(conn)
            .optional(),
    }
}

pub fn find_by_id(conn: &mut SqliteConnection, author_id: i32) -> QueryResult<Option<Author>> {
    authors::table
        .filter(authors::id.eq(author_id))
        .first::<Author>(conn)
        .optional()
}

/// Creates the author on first encounter, otherwise updates its homepage in
/// place when a new non-null value differs. A previously known homepage is
/// never unset.
pub fn upsert(conn: &mut SqliteConnection, info: &AuthorInfo) -> QueryResult<Author> {
    if let Some(author) = find_by_identity(conn, &info.name, info.email.as_deref())? {
        if let Some(web) = info.web.as_deref().filter(|web| !web.is_empty())
            && author.web.as_deref() != Some(web)
        {
            return diesel::update(authors::table.filter(authors::id.eq(author.id)))
                .set(authors::web.eq(web))
                .get_result(conn);
        }
        return Ok(author);
    }

    let new_author = NewAuthor::new(
        info.name.clone(),
        info.email.clone().filter(|e| !e.is_empty()),
        info.web.clone().filter(|w| !w.is_empty()),
    );
    diesel::insert_into(authors::table)
        .values(&new_author)
        .get_result(conn)
}

/// Authors currently related to a package in the given role.
pub fn in_role(
    conn: &mut SqliteConnection,
    package_id: i32,
    role: &str,
) -> QueryResult<Vec<Author>> {
    package_authors::table
        .inner_join(authors::table)
        .filter(package_authors::package_id.eq(package_id))
        .filter(package_authors::role.eq(role))
        .select(Author::as_select())
        .load(conn)
}

/// Reconciles a package's author relations for one role against the desired
/// set: rows are added for `desired - current` and removed for
/// `current - desired`. Set membership is diffed by author id, so running
/// the same reconciliation twice is a no-op.
pub fn reconcile(
    conn: &mut SqliteConnection,
    package_id: i32,
    package_name: &str,
    current: &[Author],
    desired: &[Author],
    role: &str,
) -> QueryResult<()> {
    let current_ids: HashSet<i32> = current.iter().map(|author| author.id).collect();
    let desired_ids: HashSet<i32> = desired.iter().map(|author| author.id).collect();

    for author in desired {
        if !current_ids.contains(&author.id) {
            let relation = NewPackageAuthor {
                package_id,
                author_id: author.id,
                role: role.to_string(),
            };
            diesel::insert_into(package_authors::table)
                .values(&relation)
                .execute(conn)?;
            info!("Added {} as {} to {}", author.name, role, package_name);
        }
    }

    for author in current {
        if !desired_ids.contains(&author.id) {
            diesel::delete(
                package_authors::table
                    .filter(package_authors::package_id.eq(package_id))
                    .filter(package_authors::author_id.eq(author.id))
                    .filter(package_authors::role.eq(role)),
            )
            .execute(conn)?;
            info!("Removed {} as {} from {}", author.name, role, package_name);
        }
    }

    Ok(())
}

pub fn delete_relations_for_package(
    conn: &mut SqliteConnection,
    package_id: i32,
) -> QueryResult<usize> {
    diesel::delete(package_authors::table.filter(package_authors::package_id.eq(package_id)))
        .execute(conn)
}
