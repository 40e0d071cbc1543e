use rocket::serde::json::Json;
use rocket::{State, delete, put};

use crate::error::RegistryError;
use crate::models::AuthenticatedUser;
use crate::routes::MessageResponse;
use crate::state::AppState;

/// Adds a user to the owners of a package
#[put("/owners/<pkg_name>/<owner_name>")]
pub fn add_owner(
    pkg_name: &str,
    owner_name: &str,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    state.registry.add_owner(pkg_name, owner_name, &user.user)?;
    Ok(Json(MessageResponse::new(format!(
        "Added {owner_name} to list of owners of {pkg_name}"
    ))))
}

/// Removes a user from the owners of a package
#[delete("/owners/<pkg_name>/<owner_name>")]
pub fn remove_owner(
    pkg_name: &str,
    owner_name: &str,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    state
        .registry
        .remove_owner(pkg_name, owner_name, &user.user)?;
    Ok(Json(MessageResponse::new(format!(
        "Removed {owner_name} from list of owners of {pkg_name}"
    ))))
}
