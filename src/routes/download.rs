use rocket::fs::NamedFile;
use rocket::response::Redirect;
use rocket::{State, get};

use crate::error::RegistryError;
use crate::state::AppState;

/// Serves a published package archive
#[get("/download/<filename>")]
pub async fn download_archive(
    filename: &str,
    state: &State<AppState>,
) -> Result<NamedFile, RegistryError> {
    let path = state.store.download_path(filename);
    NamedFile::open(&path).await.map_err(|_| {
        RegistryError::NotFound(format!("Package archive '{filename}' does not exist"))
    })
}

/// Redirects to the archive of a package version; the version may be the
/// literal string `latest`
#[get("/download/<name>/<version>")]
pub fn download_version(
    name: &str,
    version: &str,
    state: &State<AppState>,
) -> Result<Redirect, RegistryError> {
    let filename = state.registry.version_filename(name, version)?;
    Ok(Redirect::to(format!("/download/{filename}")))
}
