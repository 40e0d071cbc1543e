use log::{debug, error};
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};

use crate::descriptor::{Descriptor, canonicalize_version};
use crate::error::RegistryError;
use crate::models::AuthenticatedUser;
use crate::routes::MessageResponse;
use crate::state::AppState;
use crate::storage::PackageStore;

/// Returns the packages catalog
#[get("/packages")]
pub fn list_packages(
    state: &State<AppState>,
) -> Result<Json<Vec<serde_json::Value>>, RegistryError> {
    Ok(Json(state.registry.list_packages()?))
}

/// Returns the metadata of a package
#[get("/packages/<name>")]
pub fn get_package(
    name: &str,
    state: &State<AppState>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    Ok(Json(state.registry.get_package(name)?))
}

/// Returns the metadata of a specific version of a package; the version
/// may be the literal string `latest`
#[get("/packages/<name>/<version>")]
pub fn get_version(
    name: &str,
    version: &str,
    state: &State<AppState>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    Ok(Json(state.registry.get_version(name, version)?))
}

#[derive(rocket::FromForm)]
pub struct PublishUpload<'r> {
    pub descriptor: &'r str,
    pub pkg: TempFile<'r>,
    pub force: Option<bool>,
}

/// Publishes a version of a package from a multipart upload carrying the
/// JSON descriptor and the archive file
#[post("/packages/<name>/<version>", data = "<upload>")]
pub async fn publish(
    name: &str,
    version: &str,
    mut upload: Form<PublishUpload<'_>>,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    let mut descriptor = Descriptor::from_json(upload.descriptor)?;
    descriptor.normalize();
    descriptor.validate()?;

    if descriptor.name() != name {
        return Err(RegistryError::Validation(format!(
            "Package name mismatch: URL has '{}' but descriptor has '{}'",
            name,
            descriptor.name()
        )));
    }
    if canonicalize_version(version)? != descriptor.version() {
        return Err(RegistryError::Validation(format!(
            "Version mismatch: URL has '{}' but descriptor has '{}'",
            version,
            descriptor.version()
        )));
    }

    let original_name = upload
        .pkg
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_else(|| format!("{name}.zip"));
    debug!(
        "Publishing {} {} from upload {} ({} bytes)",
        descriptor.name(),
        descriptor.version(),
        original_name,
        upload.pkg.len()
    );

    // spool the upload through a staging file to get at the raw bytes
    let staging = std::path::Path::new(&state.config.tmp_dir)
        .join(format!("upload-{}", uuid::Uuid::new_v4().simple()));
    upload.pkg.copy_to(&staging).await?;
    let bytes = std::fs::read(&staging);
    if let Err(e) = std::fs::remove_file(&staging) {
        error!("Failed to remove staging file {}: {e}", staging.display());
    }
    let bytes = bytes?;

    // the temp archive removes itself on any failure path below
    let archive = state.store.store_temporary(&bytes, &original_name)?;
    let filename =
        PackageStore::archive_file_name(&original_name, descriptor.name(), descriptor.version());

    let force = upload.force.unwrap_or(false);
    let (package, published) =
        state
            .registry
            .publish_package(&descriptor, &archive, &filename, &user.user, force)?;

    // the archive move happens outside the transaction, after the commit
    state.store.publish_file(archive.path(), &filename)?;

    Ok(Json(MessageResponse::new(format!(
        "The package {} (v{}) has been published",
        package.name, published.version
    ))))
}

/// Deletes a whole package including all of its versions
#[delete("/packages/<name>")]
pub fn unpublish_package(
    name: &str,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    let filenames = state.registry.unpublish(name, None, &user.user)?;
    for filename in &filenames {
        state.store.remove_archive(filename);
    }
    Ok(Json(MessageResponse::new(format!(
        "Package {name} has been removed"
    ))))
}

/// Deletes a specific version of a package
#[delete("/packages/<name>/<version>")]
pub fn unpublish_version(
    name: &str,
    version: &str,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    let filenames = state.registry.unpublish(name, Some(version), &user.user)?;
    for filename in &filenames {
        state.store.remove_archive(filename);
    }
    Ok(Json(MessageResponse::new(format!(
        "Version {version} of package {name} has been removed"
    ))))
}
