use rocket::form::Form;
use rocket::serde::json::Json;
use rocket::{State, get, post};

use crate::database;
use crate::error::RegistryError;
use crate::models::AuthenticatedUser;
use crate::routes::MessageResponse;
use crate::services::AuthService;
use crate::state::AppState;

/// Returns true if a user with the given name exists
#[get("/users/<username>")]
pub fn user_exists(username: &str, state: &State<AppState>) -> Result<Json<bool>, RegistryError> {
    let mut conn = state.database.get_connection()?;
    if database::users::find_by_name(&mut conn, username)?.is_some() {
        Ok(Json(true))
    } else {
        Err(RegistryError::NotFound(format!(
            "User '{username}' does not exist"
        )))
    }
}

/// Returns the salt of the user, needed for client-side password hashing
#[get("/users/<username>/salt")]
pub fn user_salt(username: &str, state: &State<AppState>) -> Result<Json<String>, RegistryError> {
    let mut conn = state.database.get_connection()?;
    let user = database::users::find_by_name(&mut conn, username)?
        .ok_or_else(|| RegistryError::NotFound("Unknown user".to_string()))?;
    Ok(Json(user.salt))
}

#[derive(rocket::FromForm)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub salt: String,
    pub email: String,
}

/// Creates a new user account; the password arrives pre-hashed with the salt
#[post("/users", data = "<form>")]
pub fn register(
    form: Form<RegisterForm>,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    for (field, value) in [
        ("username", &form.username),
        ("password", &form.password),
        ("salt", &form.salt),
        ("email", &form.email),
    ] {
        if value.trim().is_empty() {
            return Err(RegistryError::Validation(format!(
                "Missing or invalid {field}"
            )));
        }
    }

    let user = AuthService::register_user(
        &state.database,
        form.username.trim(),
        form.password.trim(),
        form.salt.trim(),
        form.email.trim(),
    )?;
    Ok(Json(MessageResponse::new(format!(
        "The user '{}' has been registered",
        user.username
    ))))
}

#[derive(rocket::FromForm)]
pub struct PasswordForm {
    pub password: String,
}

/// Changes the authenticated user's password
#[post("/users/password", data = "<form>")]
pub fn change_password(
    form: Form<PasswordForm>,
    user: AuthenticatedUser,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    AuthService::change_password(&state.database, &user.user, &form.password)?;
    Ok(Json(MessageResponse::new("Changed password".to_string())))
}

#[derive(rocket::FromForm)]
pub struct ResetRequestForm {
    pub email: String,
}

/// Initiates the reset of a user's password
#[post("/users/<username>/reset", data = "<form>")]
pub fn init_password_reset(
    username: &str,
    form: Form<ResetRequestForm>,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    AuthService::init_password_reset(&state.database, username, &form.email)?;
    Ok(Json(MessageResponse::new(format!(
        "An email has been sent to {}. Please follow the instructions therein to reset your password",
        form.email
    ))))
}

#[derive(rocket::FromForm)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
}

/// Sets a user's password using a previously issued reset token
#[post("/users/<username>/password", data = "<form>")]
pub fn reset_password(
    username: &str,
    form: Form<ResetPasswordForm>,
    state: &State<AppState>,
) -> Result<Json<MessageResponse>, RegistryError> {
    AuthService::reset_password(&state.database, username, &form.token, &form.password)?;
    Ok(Json(MessageResponse::new(
        "Your password has been reset".to_string(),
    )))
}
