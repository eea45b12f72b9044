//! Authentication route handlers.
//!
//! Handles login, registration, logout and password reset. Every
//! successful sign-in adopts the device's anonymous cart and favorites,
//! rotates the session ID and returns to the page that asked for it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{CurrentOwner, safe_redirect};
use crate::services::auth::Registration;
use crate::state::AppState;
use crate::store::{AuthAction, CartAction, ProductsAction, Store, thunks};
use crate::views::LayoutView;

// =============================================================================
// Form Types
// =============================================================================

/// Where to go after signing in.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub redirect: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub display_name: Option<String>,
    pub redirect: Option<String>,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Forgot password page query (`?sent=1` after submitting).
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordQuery {
    pub sent: Option<u8>,
}

/// Reset link query.
#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: LayoutView,
    pub error: Option<String>,
    pub redirect: String,
    pub oauth_provider: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: LayoutView,
    pub error: Option<String>,
    pub redirect: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub layout: LayoutView,
    pub sent: bool,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub layout: LayoutView,
    pub error: Option<String>,
    pub token: String,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
///
/// Already signed-in shoppers go straight to the requested page.
#[instrument(skip(state, session))]
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<RedirectQuery>,
) -> Result<Response> {
    let redirect = safe_redirect(query.redirect.as_deref()).to_owned();
    let mut store = Store::load(&session).await;
    if store.auth.is_signed_in() {
        return Ok(Redirect::to(&redirect).into_response());
    }

    let template = LoginTemplate {
        error: store.auth.take_error(),
        layout: LayoutView::from_store(&mut store, None),
        redirect,
        oauth_provider: state.oauth().map(|client| client.provider_name().to_owned()),
    };

    store.save(&session).await?;
    Ok(template.into_response())
}

/// Handle login form submission.
#[instrument(skip(state, session, owner, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let mut store = Store::load(&session).await;
    store.dispatch(AuthAction::Pending);
    let action = thunks::sign_in(state.backend(), &form.email, &form.password, &owner.device).await;

    let redirect = safe_redirect(form.redirect.as_deref());
    let retry = format!("/auth/login?redirect={}", urlencoding::encode(redirect));
    complete_sign_in(&session, store, action, redirect, &retry).await
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(session))]
pub async fn register_page(
    session: Session,
    Query(query): Query<RedirectQuery>,
) -> Result<Response> {
    let redirect = safe_redirect(query.redirect.as_deref()).to_owned();
    let mut store = Store::load(&session).await;
    if store.auth.is_signed_in() {
        return Ok(Redirect::to(&redirect).into_response());
    }

    let template = RegisterTemplate {
        error: store.auth.take_error(),
        layout: LayoutView::from_store(&mut store, None),
        redirect,
    };

    store.save(&session).await?;
    Ok(template.into_response())
}

/// Handle registration form submission.
///
/// A new account is signed in immediately.
#[instrument(skip(state, session, owner, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let registration = Registration {
        email: &form.email,
        password: &form.password,
        password_confirmation: &form.password_confirmation,
        display_name: form
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty()),
    };

    let mut store = Store::load(&session).await;
    store.dispatch(AuthAction::Pending);
    let action = thunks::sign_up(state.backend(), &registration, &owner.device).await;

    let redirect = safe_redirect(form.redirect.as_deref());
    let retry = format!("/auth/register?redirect={}", urlencoding::encode(redirect));
    complete_sign_in(&session, store, action, redirect, &retry).await
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// Drops the whole session; the device cookie stays, so the browser keeps
/// an (empty) anonymous cart.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    session.flush().await?;
    clear_sentry_user();
    add_breadcrumb("auth", "Signed out", None);
    Ok(Redirect::to("/"))
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
#[instrument(skip(session))]
pub async fn forgot_password_page(
    session: Session,
    Query(query): Query<ForgotPasswordQuery>,
) -> Result<ForgotPasswordTemplate> {
    let mut store = Store::load(&session).await;
    let template = ForgotPasswordTemplate {
        layout: LayoutView::from_store(&mut store, None),
        sent: query.sent.is_some(),
    };
    store.save(&session).await?;
    Ok(template)
}

/// Handle forgot password form submission.
///
/// The answer is the same whether or not the address has an account.
#[instrument(skip(state, session, form))]
pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Redirect> {
    let mut store = Store::load(&session).await;
    store.dispatch(AuthAction::Pending);
    store.dispatch(
        thunks::request_password_reset(
            state.backend(),
            state.mailer(),
            &state.config().base_url,
            &form.email,
        )
        .await,
    );
    store.save(&session).await?;

    Ok(Redirect::to("/auth/forgot-password?sent=1"))
}

/// Display the reset password page from an emailed link.
#[instrument(skip_all)]
pub async fn reset_password_page(
    session: Session,
    Query(query): Query<ResetQuery>,
) -> Result<Response> {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Ok(Redirect::to("/auth/forgot-password").into_response());
    };

    let mut store = Store::load(&session).await;
    let template = ResetPasswordTemplate {
        error: store.auth.take_error(),
        layout: LayoutView::from_store(&mut store, None),
        token,
    };

    store.save(&session).await?;
    Ok(template.into_response())
}

/// Handle reset password form submission; success signs the user in.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    let mut store = Store::load(&session).await;
    store.dispatch(AuthAction::Pending);
    let action = thunks::reset_password(
        state.backend(),
        &form.token,
        &form.password,
        &form.password_confirmation,
        &owner.device,
    )
    .await;

    let retry = format!(
        "/auth/reset-password?token={}",
        urlencoding::encode(&form.token)
    );
    complete_sign_in(&session, store, action, "/", &retry).await
}

// =============================================================================
// Helpers
// =============================================================================

/// Finish a sign-in attempt.
///
/// On success the session ID is rotated, cached cart and favorites state is
/// dropped (the owner changed) and the browser goes to `redirect`. On
/// failure the error is kept for the form at `retry`.
pub(crate) async fn complete_sign_in(
    session: &Session,
    mut store: Store,
    action: AuthAction,
    redirect: &str,
    retry: &str,
) -> Result<Response> {
    match action {
        AuthAction::SignedIn(user) => {
            session.cycle_id().await?;
            set_sentry_user(&user.id, Some(user.email.as_str()));
            add_breadcrumb("auth", "Signed in", None);
            tracing::info!(user_id = %user.id, "Shopper signed in");

            store.dispatch(AuthAction::SignedIn(user));
            store.dispatch(CartAction::Reset);
            store.dispatch(ProductsAction::SetActiveCollection(None));
            store.save(session).await?;
            Ok(Redirect::to(redirect).into_response())
        }
        other => {
            store.dispatch(other);
            store.save(session).await?;
            Ok(Redirect::to(retry).into_response())
        }
    }
}
