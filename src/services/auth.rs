use base64::prelude::*;
use log::{debug, info};

use crate::database::{self, DatabaseService};
use crate::error::RegistryError;
use crate::models::{NewResetToken, NewUser, ResetToken, User};

pub struct AuthService;

impl AuthService {
    /// Verifies HTTP Basic credentials against the stored digest. The
    /// client hashes the password with the user's salt before sending, so
    /// the comparison here is byte-exact between the two base64 payloads.
    pub fn authenticate(
        db: &DatabaseService,
        username: &str,
        password: &str,
    ) -> Result<User, RegistryError> {
        let mut conn = db.get_connection()?;

        let user = database::users::find_by_name(&mut conn, username)?.ok_or_else(|| {
            RegistryError::Authentication(format!("Unknown user {username}"))
        })?;

        let digest = BASE64_STANDARD.decode(&user.password_digest).map_err(|e| {
            RegistryError::Internal(format!("Stored digest for {username} is not base64: {e}"))
        })?;
        let supplied = BASE64_STANDARD
            .decode(password)
            .map_err(|_| RegistryError::Authentication("Password incorrect".to_string()))?;

        if digest != supplied {
            return Err(RegistryError::Authentication(
                "Password incorrect".to_string(),
            ));
        }
        debug!("Authenticated user {username}");
        Ok(user)
    }

    /// Creates a new user account. The password digest and salt arrive
    /// pre-computed from the client.
    pub fn register_user(
        db: &DatabaseService,
        username: &str,
        password_digest: &str,
        salt: &str,
        email: &str,
    ) -> Result<User, RegistryError> {
        let mut conn = db.get_connection()?;

        if database::users::find_by_name(&mut conn, username)?.is_some() {
            return Err(RegistryError::Conflict(
                "Please choose a different username".to_string(),
            ));
        }

        let new_user = NewUser::new(
            username.to_string(),
            password_digest.to_string(),
            salt.to_string(),
            email.to_string(),
        );
        let user = database::users::insert(&mut conn, &new_user)?;
        info!("Created new user account {} ({})", user.username, user.email);
        Ok(user)
    }

    pub fn change_password(
        db: &DatabaseService,
        user: &User,
        password_digest: &str,
    ) -> Result<(), RegistryError> {
        let mut conn = db.get_connection()?;
        database::users::update_password(&mut conn, user.id, password_digest)?;
        info!("Changed password of {}", user.username);
        Ok(())
    }

    /// Creates a password reset token for a user after checking the claimed
    /// email address. Delivery of the token is the caller's concern.
    pub fn init_password_reset(
        db: &DatabaseService,
        username: &str,
        email: &str,
    ) -> Result<ResetToken, RegistryError> {
        let mut conn = db.get_connection()?;

        let user = database::users::find_by_name(&mut conn, username)?
            .ok_or_else(|| RegistryError::NotFound("Unknown user".to_string()))?;
        if user.email != email {
            return Err(RegistryError::Authentication(
                "Email address does not match".to_string(),
            ));
        }

        let token = database::users::insert_reset_token(&mut conn, &NewResetToken::new(user.id))?;
        info!("Created password reset token for {}", user.username);
        Ok(token)
    }

    /// Consumes a valid reset token and stores the new digest. Tokens are
    /// only honored within 24 hours of creation.
    pub fn reset_password(
        db: &DatabaseService,
        username: &str,
        token_str: &str,
        password_digest: &str,
    ) -> Result<(), RegistryError> {
        use diesel::Connection;

        let mut conn = db.get_connection()?;

        let user = database::users::find_by_name(&mut conn, username)?
            .ok_or_else(|| RegistryError::NotFound("Unknown user".to_string()))?;
        let token = database::users::latest_reset_token(&mut conn, user.id)?;
        let token = match token {
            Some(token) if token.is_valid(user.id, token_str) => token,
            _ => {
                return Err(RegistryError::Authentication(
                    "Password reset token is invalid".to_string(),
                ));
            }
        };

        conn.transaction::<_, RegistryError, _>(|conn| {
            database::users::update_password(conn, user.id, password_digest)?;
            database::users::delete_reset_token(conn, token.id)?;
            Ok(())
        })?;
        info!("Reset password of {}", user.username);
        Ok(())
    }
}
