use rocket::{
    State,
    http::Status,
    request::{FromRequest, Outcome, Request},
};

use crate::error::RegistryError;
use crate::models::User;

// Request guard extracting the acting user from HTTP Basic credentials
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
}

/// Decodes an `Authorization: Basic ...` header value into (username, password).
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    use base64::prelude::*;

    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = RegistryError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        use crate::services::AuthService;
        use crate::state::AppState;

        let Outcome::Success(state) = request.guard::<&State<AppState>>().await else {
            return Outcome::Error((
                Status::InternalServerError,
                RegistryError::Internal("Application state unavailable".to_string()),
            ));
        };

        let Some(auth_value) = request.headers().get_one("Authorization") else {
            return Outcome::Error((
                Status::Forbidden,
                RegistryError::Authentication("Authorization header required".to_string()),
            ));
        };

        let Some((username, password)) = parse_basic_credentials(auth_value) else {
            return Outcome::Error((
                Status::Forbidden,
                RegistryError::Authentication("Invalid authorization format".to_string()),
            ));
        };

        match AuthService::authenticate(&state.database, &username, &password) {
            Ok(user) => Outcome::Success(AuthenticatedUser { user }),
            Err(err) => Outcome::Error((Status::Forbidden, err)),
        }
    }
}
