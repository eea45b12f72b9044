//! Anonymous device identification.
//!
//! Every request gets a [`DeviceFingerprint`] in its extensions. Clients
//! that manage their own identifier send it in `x-device-fingerprint`;
//! browsers get a long-lived `vivero_device` cookie. The fingerprint owns
//! the shopper's cart and favorites until they sign in.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use vivero_core::DeviceFingerprint;

use crate::state::AppState;

/// Cookie carrying the browser's fingerprint.
pub const DEVICE_COOKIE_NAME: &str = "vivero_device";

/// Header a client can use to supply its own fingerprint.
pub const DEVICE_HEADER: &str = "x-device-fingerprint";

/// Cookie lifetime (one year).
const DEVICE_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// The fingerprint resolved for the current request.
#[derive(Debug, Clone)]
pub struct DeviceId(pub DeviceFingerprint);

impl<S> FromRequestParts<S> for DeviceId
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        device_from_parts(parts)
            .map(Self)
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// The fingerprint placed in the extensions by [`device_fingerprint_middleware`].
pub(crate) fn device_from_parts(parts: &Parts) -> Option<DeviceFingerprint> {
    parts.extensions.get::<DeviceId>().map(|d| d.0.clone())
}

/// Resolve (or mint) the device fingerprint for each request.
///
/// A valid header wins over the cookie. A cookie is issued whenever the
/// browser did not already present a valid one.
pub async fn device_fingerprint_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let from_header = header_fingerprint(request.headers());
    let from_cookie = cookie_fingerprint(request.headers());

    let (fingerprint, issue_cookie) = match (from_header, from_cookie) {
        (Some(fp), cookie) => (fp, cookie.is_none()),
        (None, Some(fp)) => (fp, false),
        (None, None) => {
            let fp = DeviceFingerprint::generate();
            tracing::debug!(device = %fp, "Issued device fingerprint");
            (fp, true)
        }
    };

    request.extensions_mut().insert(DeviceId(fingerprint.clone()));
    let mut response = next.run(request).await;

    if issue_cookie {
        let cookie = device_cookie(&fingerprint, state.config().is_secure());
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

fn header_fingerprint(headers: &HeaderMap) -> Option<DeviceFingerprint> {
    let value = headers.get(DEVICE_HEADER)?.to_str().ok()?;
    match DeviceFingerprint::parse(value.trim()) {
        Ok(fp) => Some(fp),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring invalid device fingerprint header");
            None
        }
    }
}

fn cookie_fingerprint(headers: &HeaderMap) -> Option<DeviceFingerprint> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == DEVICE_COOKIE_NAME)
        .and_then(|cookie| DeviceFingerprint::parse(cookie.value()).ok())
}

fn device_cookie(fingerprint: &DeviceFingerprint, secure: bool) -> Cookie<'static> {
    Cookie::build((DEVICE_COOKIE_NAME, fingerprint.as_str().to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(DEVICE_COOKIE_MAX_AGE_DAYS))
        .build()
}
