pub mod download;
pub mod owners;
pub mod packages;
pub mod search;
pub mod users;

use rocket::routes;
use rocket::serde::Serialize;

#[derive(Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

pub fn get_routes() -> Vec<rocket::Route> {
    routes![
        // Package catalog and publishing
        packages::list_packages,
        packages::get_package,
        packages::get_version,
        packages::publish,
        packages::unpublish_package,
        packages::unpublish_version,
        // Ownership management
        owners::add_owner,
        owners::remove_owner,
        // User accounts
        users::user_exists,
        users::user_salt,
        users::register,
        users::change_password,
        users::init_password_reset,
        users::reset_password,
        // Search and update feed
        search::search,
        search::updates,
        // Archive downloads
        download::download_archive,
        download::download_version,
    ]
}
