//! Authentication extractors.
//!
//! Handlers ask for the signed-in shopper with [`RequireAuth`] or
//! [`OptionalAuth`], and for the cart/favorites owner with [`CurrentOwner`].
//! All three read the user that `Store::save` mirrors into the session.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use vivero_core::DeviceFingerprint;

use super::device::device_from_parts;
use super::protected::login_redirect;
use crate::models::{CurrentUser, Owner, session_keys};

/// Extractor that requires a signed-in shopper.
///
/// Redirects to the login page, carrying the requested URL, when nobody is
/// signed in.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hola, {}", user.greeting_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for [`RequireAuth`].
#[derive(Debug)]
pub enum AuthRejection {
    /// Send the browser to the login page, then back to `return_to`.
    RedirectToLogin(String),
    /// The session layer is missing.
    MissingSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(location) => Redirect::to(&location).into_response(),
            Self::MissingSession => {
                tracing::error!("Session layer missing from router");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::MissingSession)?;

        current_user(session)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::RedirectToLogin(login_redirect(&parts.uri)))
    }
}

/// Extractor that optionally gets the signed-in shopper.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await,
            None => None,
        };

        Ok(Self(user))
    }
}

/// Who owns the cart and favorites for this request.
///
/// The signed-in user when there is one, otherwise the device. The device
/// fingerprint is always available so sign-in handlers can adopt its data.
#[derive(Debug, Clone)]
pub struct CurrentOwner {
    pub owner: Owner,
    pub device: DeviceFingerprint,
    pub user: Option<CurrentUser>,
}

impl<S> FromRequestParts<S> for CurrentOwner
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let device = device_from_parts(parts).ok_or_else(|| {
            tracing::error!("Device fingerprint middleware missing from router");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await,
            None => None,
        };

        let owner = user
            .as_ref()
            .map_or_else(|| Owner::Device(device.clone()), |u| Owner::User(u.id));

        Ok(Self {
            owner,
            device,
            user,
        })
    }
}

/// Read the signed-in user, treating unreadable values as signed out.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    match session.get::<CurrentUser>(session_keys::CURRENT_USER).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read current user from session");
            None
        }
    }
}
