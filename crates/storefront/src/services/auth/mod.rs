//! Authentication service.
//!
//! Password sign-up and sign-in, password reset tokens, and linking
//! external OAuth identities to storefront users.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use vivero_core::{Email, UserId};

use crate::backend::AccountBackend;
use crate::db::RepositoryError;
use crate::models::{OAuthProfile, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// How long a password reset link stays valid.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Sign-up form input.
#[derive(Debug)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
    pub display_name: Option<&'a str>,
}

/// A freshly issued reset token and the user it belongs to.
///
/// `token` is the only copy of the plaintext; the backend keeps a digest.
#[derive(Debug)]
pub struct ResetRequest {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service.
pub struct AuthService<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: AccountBackend + ?Sized> AuthService<'a, B> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::PasswordMismatch` if the confirmation differs.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip_all)]
    pub async fn register(&self, form: &Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(form.email)?;
        validate_password(form.password)?;
        if form.password != form.password_confirmation {
            return Err(AuthError::PasswordMismatch);
        }

        let display_name = form.display_name.map(str::trim).filter(|n| !n.is_empty());
        let password_hash = hash_password(form.password)?;

        let user = self
            .backend
            .create_user(&email, display_name, Some(&password_hash))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .backend
            .password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.backend
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for `email`.
    ///
    /// Returns `Ok(None)` for unknown or malformed addresses so callers can
    /// answer identically either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    #[instrument(skip_all)]
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<ResetRequest>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.backend.find_user_by_email(&email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.backend
            .create_reset_token(user.id, &token_digest(&token), expires_at)
            .await?;

        info!(user_id = %user.id, "Password reset token issued");
        Ok(Some(ResetRequest {
            user,
            token,
            expires_at,
        }))
    }

    /// Set a new password using a reset token. The token is single-use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetToken` for unknown, used, or expired
    /// tokens, and the password validation errors of [`Self::register`].
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<User, AuthError> {
        validate_password(password)?;
        if password != password_confirmation {
            return Err(AuthError::PasswordMismatch);
        }

        let user_id = self
            .backend
            .consume_reset_token(&token_digest(token.trim()), Utc::now())
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let password_hash = hash_password(password)?;
        self.backend
            .set_password_hash(user_id, &password_hash)
            .await?;

        info!(user_id = %user_id, "Password reset");
        self.get_user(user_id).await
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Resolve the user for an external identity, creating or linking as needed.
    ///
    /// Lookup order: existing link, then a user with the same email, then a
    /// new passwordless user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the backend fails.
    #[instrument(skip_all, fields(provider = %profile.provider))]
    pub async fn oauth_sign_in(&self, profile: &OAuthProfile) -> Result<User, AuthError> {
        if let Some(user_id) = self
            .backend
            .find_oauth_identity(&profile.provider, &profile.subject)
            .await?
        {
            return self.get_user(user_id).await;
        }

        let user = match self.backend.find_user_by_email(&profile.email).await? {
            Some(user) => user,
            None => {
                let created = self
                    .backend
                    .create_user(&profile.email, profile.name.as_deref(), None)
                    .await;
                match created {
                    Ok(user) => user,
                    Err(RepositoryError::Conflict(_)) => {
                        warn!("User created concurrently during OAuth sign-in");
                        self.backend
                            .find_user_by_email(&profile.email)
                            .await?
                            .ok_or(AuthError::UserNotFound)?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        self.backend
            .link_oauth_identity(&profile.provider, &profile.subject, user.id)
            .await?;

        info!(user_id = %user.id, "OAuth identity linked");
        Ok(user)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// 32 random bytes, base64url without padding.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex sha256 of a reset token, as stored by the backend.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
