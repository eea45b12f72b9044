//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] vivero_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Reset token unknown, used, or expired.
    #[error("invalid or expired reset token")]
    InvalidResetToken,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Message safe to show on the sign-in and sign-up forms.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Introduce un correo electrónico válido.".to_owned(),
            Self::InvalidCredentials | Self::UserNotFound => {
                "Correo o contraseña incorrectos.".to_owned()
            }
            Self::UserAlreadyExists => "Ya existe una cuenta con ese correo.".to_owned(),
            Self::WeakPassword(_) => {
                "La contraseña debe tener al menos 8 caracteres.".to_owned()
            }
            Self::PasswordMismatch => "Las contraseñas no coinciden.".to_owned(),
            Self::InvalidResetToken => {
                "El enlace de recuperación no es válido o ha caducado.".to_owned()
            }
            Self::Repository(_) | Self::PasswordHash => {
                "No se pudo completar la operación. Inténtalo de nuevo.".to_owned()
            }
        }
    }
}
