//! Sign-in gate for account pages.
//!
//! Requests under [`PROTECTED_PREFIXES`] without a signed-in user are sent
//! to `/auth/login?redirect=<original path and query>`. Everything else
//! passes through untouched.

use axum::{
    extract::Request,
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::auth::current_user;

/// Path prefixes that need a signed-in user.
pub const PROTECTED_PREFIXES: &[&str] = &["/profile", "/checkout", "/favorites"];

/// Where unauthenticated requests are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Whether `path` is a protected prefix itself or lies below one.
#[must_use]
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Login URL that returns to `uri` afterwards.
#[must_use]
pub fn login_redirect(uri: &Uri) -> String {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(target))
}

/// Post-login destination: `requested` when it is a local path, else `/`.
///
/// Protocol-relative (`//host`) and backslash tricks are refused.
#[must_use]
pub fn safe_redirect(requested: Option<&str>) -> &str {
    match requested {
        Some(target)
            if target.starts_with('/')
                && !target.starts_with("//")
                && !target.starts_with("/\\")
                && !target.contains(['\r', '\n']) =>
        {
            target
        }
        _ => "/",
    }
}

/// Middleware that gates [`PROTECTED_PREFIXES`] behind a signed-in session.
pub async fn protected_paths_middleware(session: Session, request: Request, next: Next) -> Response {
    if !is_protected(request.uri().path()) || current_user(&session).await.is_some() {
        return next.run(request).await;
    }

    let location = login_redirect(request.uri());
    tracing::debug!(path = %request.uri().path(), "Redirecting anonymous request to login");
    Redirect::to(&location).into_response()
}
