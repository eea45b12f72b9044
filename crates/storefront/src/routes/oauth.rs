//! External sign-in (OAuth 2.0 authorization code) route handlers.
//!
//! - Login: stores a CSRF state and the post-login page, then redirects to
//!   the provider
//! - Callback: checks the state, exchanges the code, reads the profile and
//!   signs the matching user in
//!
//! Both answer 404 when no provider is configured.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::auth::{RedirectQuery, complete_sign_in};
use crate::error::{AppError, Result};
use crate::middleware::{CurrentOwner, safe_redirect};
use crate::models::session_keys;
use crate::services::auth::generate_token;
use crate::state::AppState;
use crate::store::{AuthAction, Store, thunks};

/// Shown for any failed provider round trip.
const PROVIDER_FAILED: &str = "No se pudo iniciar sesión con el proveedor externo.";

/// Query parameters from the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

fn callback_uri(state: &AppState) -> String {
    format!("{}/auth/oauth/callback", state.config().base_url)
}

/// Initiate OAuth login.
///
/// # Route
///
/// `GET /auth/oauth/login`
#[instrument(skip(state, session))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<RedirectQuery>,
) -> Result<Response> {
    let client = state
        .oauth()
        .ok_or_else(|| AppError::NotFound("oauth".to_owned()))?;

    let oauth_state = generate_token();
    session.insert(session_keys::OAUTH_STATE, &oauth_state).await?;
    session
        .insert(
            session_keys::OAUTH_REDIRECT,
            safe_redirect(query.redirect.as_deref()),
        )
        .await?;

    let auth_url = client.authorization_url(&callback_uri(&state), &oauth_state)?;
    Ok(Redirect::to(&auth_url).into_response())
}

/// Handle the provider callback.
///
/// # Route
///
/// `GET /auth/oauth/callback`
#[instrument(skip(state, session, owner, query))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let client = state
        .oauth()
        .ok_or_else(|| AppError::NotFound("oauth".to_owned()))?;

    // One-time use, whatever the outcome.
    let stored_state: Option<String> = session.remove(session_keys::OAUTH_STATE).await?;
    let redirect: String = session
        .remove(session_keys::OAUTH_REDIRECT)
        .await?
        .unwrap_or_else(|| "/".to_owned());
    let redirect = safe_redirect(Some(&redirect)).to_owned();
    let retry = format!("/auth/login?redirect={}", urlencoding::encode(&redirect));

    let mut store = Store::load(&session).await;
    store.dispatch(AuthAction::Pending);

    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!(%error, %description, "OAuth provider returned an error");
        return reject(&session, store, &retry).await;
    }

    let Some(code) = query.code else {
        tracing::warn!("OAuth callback missing code");
        return reject(&session, store, &retry).await;
    };

    if stored_state.is_none() || stored_state != query.state {
        tracing::warn!("OAuth state mismatch");
        return reject(&session, store, &retry).await;
    }

    let redirect_uri = callback_uri(&state);
    let profile = match client.exchange_code(&code, &redirect_uri).await {
        Ok(token) => client.fetch_profile(&token).await,
        Err(e) => Err(e),
    };
    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth sign-in failed");
            return reject(&session, store, &retry).await;
        }
    };

    let action = thunks::oauth_sign_in(state.backend(), &profile, &owner.device).await;
    complete_sign_in(&session, store, action, &redirect, &retry).await
}

async fn reject(session: &Session, store: Store, retry: &str) -> Result<Response> {
    let action = AuthAction::Rejected(PROVIDER_FAILED.to_owned());
    complete_sign_in(session, store, action, "/", retry).await
}
