use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, SecondsFormat};
use diesel::prelude::*;
use log::{error, info};
use rocket::serde::Serialize;

use crate::database::{self, DatabaseService};
use crate::descriptor::{Descriptor, canonicalize_version};
use crate::error::RegistryError;
use crate::models::author::{ROLE_CONTRIBUTOR, ROLE_MAINTAINER};
use crate::models::{Author, LogEntryType, NewLogEntry, NewPackage, NewVersion, Package, User, Version};
use crate::search::{PackageDocument, SearchIndex, SearchPage};
use crate::storage::TempArchive;

#[derive(Serialize, Debug, Clone)]
pub struct AuthorOut {
    pub name: String,
    pub email: Option<String>,
    pub web: Option<String>,
    pub gravatar: Option<String>,
}

impl AuthorOut {
    fn from(author: &Author) -> Self {
        Self {
            name: author.name.clone(),
            email: author.email.clone(),
            web: author.web.clone(),
            gravatar: author.gravatar_hash(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct OwnerOut {
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChecksumsOut {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

/// Wire shape of a single version, also the base of the package shape.
#[derive(Serialize, Debug, Clone)]
pub struct VersionOut {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub latest: String,
    pub filename: String,
    pub filesize: i64,
    pub modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorOut>,
    pub repositories: Vec<serde_json::Value>,
    pub licenses: Vec<serde_json::Value>,
    pub maintainers: Vec<AuthorOut>,
    pub contributors: Vec<AuthorOut>,
    pub dependencies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engines: Option<serde_json::Value>,
    pub checksums: ChecksumsOut,
}

#[derive(Serialize, Debug)]
pub struct SearchResponse {
    pub total: usize,
    pub offset: usize,
    pub length: usize,
    pub hits: Vec<serde_json::Value>,
}

#[derive(Serialize, Debug)]
pub struct UpdatesResponse {
    pub updated: Vec<serde_json::Value>,
    pub removed: Vec<String>,
}

fn iso(timestamp: NaiveDateTime) -> String {
    timestamp
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parsed_version(version: &str) -> Option<semver::Version> {
    semver::Version::parse(version).ok()
}

/// Coordinates the publish/unpublish pipeline: relational mutations happen
/// inside one transaction per request, the search index is written after a
/// successful commit, and archive files are the caller's responsibility
/// outside the transaction. Stateless between calls; all shared handles are
/// injected.
pub struct RegistryService {
    db: Arc<DatabaseService>,
    index: Arc<SearchIndex>,
}

impl RegistryService {
    pub fn new(db: Arc<DatabaseService>, index: Arc<SearchIndex>) -> Self {
        Self { db, index }
    }

    /// Publishes one version of a package: creates or updates the package
    /// and version rows, reconciles author relations, appends an audit
    /// entry and refreshes the search index. The archive stays in the temp
    /// location; on success the caller moves it into the download
    /// directory.
    ///
    /// The descriptor must already be normalized and validated.
    pub fn publish_package(
        &self,
        descriptor: &Descriptor,
        archive: &TempArchive,
        filename: &str,
        user: &User,
        force: bool,
    ) -> Result<(Package, Version), RegistryError> {
        let mut conn = self.db.get_connection()?;
        let name = descriptor.name();
        let version_str = descriptor.version();

        // Authorization runs before the transaction opens, so rejected
        // requests never touch the store. An ownership change landing
        // between this check and the transaction below is a known, narrow
        // race; the store's uniqueness constraints keep it harmless.
        let existing = database::packages::find_by_name(&mut conn, name)?;
        if let Some(pkg) = &existing
            && !database::owners::is_owner(&mut conn, pkg.id, user.id)?
        {
            return Err(RegistryError::Authentication(
                "Only owners of a package are allowed to publish".to_string(),
            ));
        }

        let (package, version, document) = conn.transaction::<_, RegistryError, _>(|conn| {
            let mut contributors = Vec::new();
            for author_info in descriptor.contributor_records() {
                contributors.push(database::authors::upsert(conn, author_info)?);
            }
            let mut maintainers = Vec::new();
            for author_info in descriptor.maintainer_records() {
                maintainers.push(database::authors::upsert(conn, author_info)?);
            }

            // representative author: the explicit one, else the first contributor
            let author = match descriptor.author_record() {
                Some(author_info) => Some(database::authors::upsert(conn, author_info)?),
                None => contributors.first().cloned(),
            };
            let author = author.ok_or_else(|| {
                RegistryError::Validation("Missing author or initial contributor".to_string())
            })?;

            let package = match existing {
                Some(pkg) => pkg,
                None => {
                    let new_package = NewPackage::new(name.to_string(), Some(author.id), user.id);
                    let pkg = database::packages::insert(conn, &new_package)?;
                    // the initial publisher becomes the first owner
                    database::owners::add(conn, pkg.id, user.id, user.id)?;
                    info!(
                        "Created package {} with initial owner {}",
                        pkg.name, user.username
                    );
                    pkg
                }
            };

            let descriptor_json = descriptor.to_json()?;
            let mut entry_type = LogEntryType::Add;
            let version = match database::versions::find(conn, package.id, version_str)? {
                None => {
                    let new_version = NewVersion::new(
                        package.id,
                        version_str.to_string(),
                        descriptor_json.clone(),
                        filename.to_string(),
                        archive.size,
                        &archive.checksums,
                        user.id,
                    );
                    let version = database::versions::insert(conn, &new_version)?;
                    database::packages::set_latest_version(conn, package.id, Some(version.id))?;
                    version
                }
                Some(published) if force => {
                    entry_type = LogEntryType::Update;
                    let version = database::versions::overwrite(
                        conn,
                        published.id,
                        &descriptor_json,
                        filename,
                        archive.size,
                        &archive.checksums,
                        user.id,
                    )?;
                    // keep the package-level descriptor in step with its latest version
                    if package.latest_version_id == Some(version.id) {
                        database::packages::set_descriptor(conn, package.id, &descriptor_json)?;
                    }
                    version
                }
                Some(published) => {
                    return Err(RegistryError::Conflict(format!(
                        "Version {} of package {} has already been published",
                        published.version, name
                    )));
                }
            };
            database::packages::touch(conn, package.id, user.id)?;

            let current = database::authors::in_role(conn, package.id, ROLE_CONTRIBUTOR)?;
            database::authors::reconcile(
                conn,
                package.id,
                &package.name,
                &current,
                &contributors,
                ROLE_CONTRIBUTOR,
            )?;
            let current = database::authors::in_role(conn, package.id, ROLE_MAINTAINER)?;
            database::authors::reconcile(
                conn,
                package.id,
                &package.name,
                &current,
                &maintainers,
                ROLE_MAINTAINER,
            )?;

            database::log::append(
                conn,
                &NewLogEntry::new(
                    entry_type,
                    name.to_string(),
                    Some(version.version.clone()),
                    user.id,
                ),
            )?;

            let package = database::packages::find_by_id(conn, package.id)?.ok_or_else(|| {
                RegistryError::Internal("Package row vanished mid-transaction".to_string())
            })?;
            let document = self.build_document(conn, &package)?;
            Ok((package, version, document))
        })?;

        // Relational commit first, index write second. The index is not
        // transactional with the store, so a failure here is logged loudly
        // and repaired by an out-of-band rebuild instead of attempted
        // distributed-transaction semantics.
        if let Err(e) = self.index.upsert(&document) {
            error!(
                "Search index update for {} failed after commit: {e}",
                package.name
            );
        }

        info!("Published {} {}", package.name, version.version);
        Ok((package, version))
    }

    /// Removes a version, or the whole package when `version` is None or
    /// names the only remaining version. Returns the archive filenames the
    /// caller must delete from the download directory after the commit.
    pub fn unpublish(
        &self,
        package_name: &str,
        version: Option<&str>,
        user: &User,
    ) -> Result<Vec<String>, RegistryError> {
        let mut conn = self.db.get_connection()?;

        let package = database::packages::find_by_name(&mut conn, package_name)?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("Package '{package_name}' does not exist"))
            })?;
        if !database::owners::is_owner(&mut conn, package.id, user.id)? {
            return Err(RegistryError::Authentication(
                "Only owners of a package are allowed to unpublish".to_string(),
            ));
        }

        let (filenames, updated_document) = conn.transaction::<_, RegistryError, _>(|conn| {
            let Some(version_input) = version else {
                return Ok((self.remove_package(conn, &package, user)?, None));
            };

            let canonical = canonicalize_version(version_input)?;
            let target = database::versions::find(conn, package.id, &canonical)?.ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "Version {canonical} of package {package_name} does not exist"
                ))
            })?;

            // a package cannot exist with zero versions
            if database::versions::count_for_package(conn, package.id)? == 1 {
                return Ok((self.remove_package(conn, &package, user)?, None));
            }

            if package.latest_version_id == Some(target.id) {
                // reassign to the next-highest remaining version
                let remaining = database::versions::by_package(conn, package.id)?;
                let next = remaining
                    .iter()
                    .filter(|v| v.id != target.id)
                    .max_by_key(|v| parsed_version(&v.version));
                database::packages::set_latest_version(conn, package.id, next.map(|v| v.id))?;
            }
            database::versions::delete(conn, target.id)?;
            database::packages::touch(conn, package.id, user.id)?;
            database::log::append(
                conn,
                &NewLogEntry::new(
                    LogEntryType::Delete,
                    package.name.clone(),
                    Some(target.version.clone()),
                    user.id,
                ),
            )?;

            let package = database::packages::find_by_id(conn, package.id)?.ok_or_else(|| {
                RegistryError::Internal("Package row vanished mid-transaction".to_string())
            })?;
            let document = self.build_document(conn, &package)?;
            Ok((vec![target.filename.clone()], Some(document)))
        })?;

        match &updated_document {
            Some(document) => {
                if let Err(e) = self.index.upsert(document) {
                    error!(
                        "Search index update for {package_name} failed after commit: {e}"
                    );
                }
            }
            None => {
                if let Err(e) = self.index.remove(package_name) {
                    error!(
                        "Search index removal for {package_name} failed after commit: {e}"
                    );
                }
            }
        }

        info!(
            "Unpublished {} {}",
            package_name,
            version.unwrap_or("(all versions)")
        );
        Ok(filenames)
    }

    /// Whole-package removal inside an open transaction: versions, author
    /// relations, ownerships, the package row and a package-level audit
    /// entry. Author and user rows are left untouched.
    fn remove_package(
        &self,
        conn: &mut SqliteConnection,
        package: &Package,
        user: &User,
    ) -> Result<Vec<String>, RegistryError> {
        let versions = database::versions::by_package(conn, package.id)?;
        let filenames = versions.iter().map(|v| v.filename.clone()).collect();

        // the latest-version reference would otherwise dangle mid-delete
        database::packages::set_latest_version(conn, package.id, None)?;
        database::versions::delete_for_package(conn, package.id)?;
        database::authors::delete_relations_for_package(conn, package.id)?;
        database::owners::delete_for_package(conn, package.id)?;
        database::packages::delete(conn, package.id)?;
        database::log::append(
            conn,
            &NewLogEntry::new(LogEntryType::Delete, package.name.clone(), None, user.id),
        )?;
        Ok(filenames)
    }

    /// Grants a user ownership of a package.
    pub fn add_owner(
        &self,
        package_name: &str,
        target_username: &str,
        user: &User,
    ) -> Result<(), RegistryError> {
        let mut conn = self.db.get_connection()?;

        let package = database::packages::find_by_name(&mut conn, package_name)?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("Package '{package_name}' does not exist"))
            })?;
        let target = database::users::find_by_name(&mut conn, target_username)?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("User '{target_username}' does not exist"))
            })?;

        if !database::owners::is_owner(&mut conn, package.id, user.id)? {
            return Err(RegistryError::Authentication(
                "Only a package owner can add additional owners".to_string(),
            ));
        }
        if database::owners::is_owner(&mut conn, package.id, target.id)? {
            return Err(RegistryError::Conflict(format!(
                "{} is already owner of {}",
                target.username, package.name
            )));
        }

        info!(
            "{} adds {} to list of owners of {}",
            user.username, target.username, package.name
        );
        conn.transaction::<_, RegistryError, _>(|conn| {
            database::owners::add(conn, package.id, target.id, user.id)?;
            database::packages::touch(conn, package.id, user.id)?;
            Ok(())
        })
    }

    /// Revokes a user's ownership; a package always keeps at least one owner.
    pub fn remove_owner(
        &self,
        package_name: &str,
        target_username: &str,
        user: &User,
    ) -> Result<(), RegistryError> {
        let mut conn = self.db.get_connection()?;

        let package = database::packages::find_by_name(&mut conn, package_name)?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("Package '{package_name}' does not exist"))
            })?;
        let target = database::users::find_by_name(&mut conn, target_username)?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("User '{target_username}' does not exist"))
            })?;

        if !database::owners::is_owner(&mut conn, package.id, user.id)? {
            return Err(RegistryError::Authentication(
                "Only a package owner can remove other owners".to_string(),
            ));
        }
        if !database::owners::is_owner(&mut conn, package.id, target.id)? {
            return Err(RegistryError::Conflict(format!(
                "{} is not among the owners of {}",
                target.username, package.name
            )));
        }
        if database::owners::count_for_package(&mut conn, package.id)? < 2 {
            return Err(RegistryError::Conflict(format!(
                "{} must have at least one owner",
                package.name
            )));
        }

        info!(
            "{} removes {} from list of owners of {}",
            user.username, target.username, package.name
        );
        conn.transaction::<_, RegistryError, _>(|conn| {
            database::owners::remove(conn, package.id, target.id)?;
            database::packages::touch(conn, package.id, user.id)?;
            Ok(())
        })
    }

    pub fn list_packages(&self) -> Result<Vec<serde_json::Value>, RegistryError> {
        let mut conn = self.db.get_connection()?;
        let packages = database::packages::all(&mut conn)?;
        packages
            .iter()
            .map(|package| self.serialize_package_row(&mut conn, package))
            .collect()
    }

    pub fn get_package(&self, name: &str) -> Result<serde_json::Value, RegistryError> {
        let mut conn = self.db.get_connection()?;
        let package = database::packages::find_by_name(&mut conn, name)?
            .ok_or_else(|| RegistryError::NotFound(format!("Package '{name}' not found")))?;
        self.serialize_package_row(&mut conn, &package)
    }

    /// Serialized metadata of one version; `version` may be the literal
    /// string `latest`.
    pub fn get_version(&self, name: &str, version: &str) -> Result<serde_json::Value, RegistryError> {
        let mut conn = self.db.get_connection()?;
        let not_found =
            || RegistryError::NotFound(format!("Version {version} of package '{name}' not found"));

        let package = database::packages::find_by_name(&mut conn, name)?
            .ok_or_else(not_found)?;
        let row = if version == "latest" {
            match package.latest_version_id {
                Some(id) => database::versions::find_by_id(&mut conn, id)?,
                None => None,
            }
        } else {
            let canonical = canonicalize_version(version)?;
            database::versions::find(&mut conn, package.id, &canonical)?
        };
        let row = row.ok_or_else(not_found)?;
        let out = self.serialize_version_row(&mut conn, &package, &row)?;
        Ok(serde_json::to_value(out)?)
    }

    /// Archive filename for a version; `version` may be the literal
    /// string `latest`. Used to redirect downloads.
    pub fn version_filename(&self, name: &str, version: &str) -> Result<String, RegistryError> {
        let mut conn = self.db.get_connection()?;
        let not_found =
            || RegistryError::NotFound(format!("Package '{name}' does not exist"));

        let package = database::packages::find_by_name(&mut conn, name)?
            .ok_or_else(not_found)?;
        let row = if version == "latest" {
            match package.latest_version_id {
                Some(id) => database::versions::find_by_id(&mut conn, id)?,
                None => None,
            }
        } else {
            let canonical = canonicalize_version(version)?;
            database::versions::find(&mut conn, package.id, &canonical)?
        };
        row.map(|v| v.filename).ok_or_else(not_found)
    }

    pub fn search(
        &self,
        query: Option<&str>,
        length: Option<usize>,
        offset: Option<usize>,
    ) -> Result<SearchResponse, RegistryError> {
        let page: SearchPage = self.index.search(
            query,
            length.unwrap_or(crate::search::PAGE_SIZE),
            offset.unwrap_or(0),
        )?;

        let mut conn = self.db.get_connection()?;
        let mut hits = Vec::with_capacity(page.names.len());
        for name in &page.names {
            // the index may briefly trail the store; skip stale hits
            if let Some(package) = database::packages::find_by_name(&mut conn, name)? {
                hits.push(self.serialize_package_row(&mut conn, &package)?);
            }
        }

        Ok(SearchResponse {
            total: page.total,
            offset: page.offset,
            length: hits.len(),
            hits,
        })
    }

    /// Packages updated and removed since the given time; `None` signals
    /// "nothing changed" (a 304 upstream).
    pub fn updates_since(
        &self,
        since: NaiveDateTime,
    ) -> Result<Option<UpdatesResponse>, RegistryError> {
        let mut conn = self.db.get_connection()?;

        let updated_rows = database::packages::updated_since(&mut conn, since)?;
        let mut updated = Vec::with_capacity(updated_rows.len());
        for package in &updated_rows {
            updated.push(self.serialize_package_row(&mut conn, package)?);
        }
        let removed = database::log::removed_package_names_since(&mut conn, since)?;

        if updated.is_empty() && removed.is_empty() {
            return Ok(None);
        }
        Ok(Some(UpdatesResponse { updated, removed }))
    }

    /// Rebuilds the search index from the relational store.
    pub fn rebuild_index(&self) -> Result<usize, RegistryError> {
        let mut conn = self.db.get_connection()?;
        let packages = database::packages::all(&mut conn)?;
        let mut documents = Vec::with_capacity(packages.len());
        for package in &packages {
            documents.push(self.build_document(&mut conn, package)?);
        }
        self.index.rebuild(&documents)?;
        Ok(documents.len())
    }

    /// Startup recovery: an empty index next to a non-empty store means the
    /// index was lost or never built.
    pub fn rebuild_index_if_stale(&self) -> Result<(), RegistryError> {
        if !self.index.is_empty() {
            return Ok(());
        }
        let count = self.rebuild_index()?;
        if count > 0 {
            info!("Search index was empty, rebuilt from {count} packages");
        }
        Ok(())
    }

    fn build_document(
        &self,
        conn: &mut SqliteConnection,
        package: &Package,
    ) -> Result<PackageDocument, RegistryError> {
        let descriptor = match package.latest_version_id {
            Some(id) => database::versions::find_by_id(conn, id)?
                .map(|v| Descriptor::from_json(&v.descriptor))
                .transpose()?,
            None => None,
        }
        .unwrap_or_default();

        let author = match package.author_id {
            Some(id) => database::authors::find_by_id(conn, id)?.map(|a| a.name),
            None => None,
        };
        let maintainers = database::authors::in_role(conn, package.id, ROLE_MAINTAINER)?
            .into_iter()
            .map(|a| a.name)
            .collect();
        let contributors = database::authors::in_role(conn, package.id, ROLE_CONTRIBUTOR)?
            .into_iter()
            .map(|a| a.name)
            .collect();

        Ok(PackageDocument {
            name: package.name.clone(),
            description: descriptor.description.clone(),
            keywords: descriptor.keywords.clone(),
            author,
            maintainers,
            contributors,
            modified: package.updated_at.and_utc().timestamp(),
        })
    }

    fn serialize_version_row(
        &self,
        conn: &mut SqliteConnection,
        package: &Package,
        version: &Version,
    ) -> Result<VersionOut, RegistryError> {
        let descriptor = Descriptor::from_json(&version.descriptor)?;

        let latest = match package.latest_version_id {
            Some(id) if id == version.id => version.version.clone(),
            Some(id) => database::versions::find_by_id(conn, id)?
                .map(|v| v.version)
                .unwrap_or_else(|| version.version.clone()),
            None => version.version.clone(),
        };

        let author = match package.author_id {
            Some(id) => database::authors::find_by_id(conn, id)?
                .map(|author| AuthorOut::from(&author)),
            None => None,
        };
        let maintainers = database::authors::in_role(conn, package.id, ROLE_MAINTAINER)?
            .iter()
            .map(AuthorOut::from)
            .collect();
        let contributors = database::authors::in_role(conn, package.id, ROLE_CONTRIBUTOR)?
            .iter()
            .map(AuthorOut::from)
            .collect();

        Ok(VersionOut {
            name: package.name.clone(),
            version: version.version.clone(),
            description: descriptor.description,
            keywords: descriptor.keywords,
            latest,
            filename: version.filename.clone(),
            filesize: version.filesize,
            modified: iso(version.updated_at),
            homepage: descriptor.homepage,
            author,
            repositories: descriptor.repositories,
            licenses: descriptor.licenses,
            maintainers,
            contributors,
            dependencies: descriptor.dependencies,
            engines: descriptor.engines,
            checksums: ChecksumsOut {
                md5: version.md5.clone(),
                sha1: version.sha1.clone(),
                sha256: version.sha256.clone(),
            },
        })
    }

    /// Serializes a package as its latest version plus the full version
    /// list (descending) and the owner set.
    fn serialize_package_row(
        &self,
        conn: &mut SqliteConnection,
        package: &Package,
    ) -> Result<serde_json::Value, RegistryError> {
        let latest = match package.latest_version_id {
            Some(id) => database::versions::find_by_id(conn, id)?,
            None => None,
        }
        .ok_or_else(|| {
            RegistryError::Internal(format!("Package {} has no latest version", package.name))
        })?;

        let mut value =
            serde_json::to_value(self.serialize_version_row(conn, package, &latest)?)?;
        let object = value.as_object_mut().ok_or_else(|| {
            RegistryError::Internal("Serialized package is not an object".to_string())
        })?;

        object.insert("modified".to_string(), serde_json::json!(iso(package.updated_at)));

        let mut versions = database::versions::by_package(conn, package.id)?;
        versions.sort_by(|a, b| {
            parsed_version(&b.version).cmp(&parsed_version(&a.version))
        });
        let mut serialized_versions = Vec::with_capacity(versions.len());
        for row in &versions {
            serialized_versions.push(serde_json::to_value(
                self.serialize_version_row(conn, package, row)?,
            )?);
        }
        object.insert(
            "versions".to_string(),
            serde_json::Value::Array(serialized_versions),
        );

        let owners: Vec<OwnerOut> = database::owners::owners_of(conn, package.id)?
            .into_iter()
            .map(|owner| OwnerOut {
                name: owner.username,
                email: owner.email,
            })
            .collect();
        object.insert("owners".to_string(), serde_json::to_value(owners)?);

        Ok(value)
    }
}
