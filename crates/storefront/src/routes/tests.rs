//! Router-level tests over the in-memory backend.
//!
//! Each test builds its own router, so the `/auth` rate limiter starts with
//! a full bucket; keep auth requests per test under its burst size.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use tracing_subscriber::fmt::MakeWriter;

use crate::app;
use crate::backend::fake::FakeBackend;
use crate::config::tests::test_config;
use crate::state::AppState;

fn router() -> Router {
    let state = AppState::with_backend(test_config(), Arc::new(FakeBackend::seeded()))
        .expect("state without SMTP builds");
    app(state, MemoryStore::default())
}

/// Minimal cookie jar: remembers `name=value` pairs across requests.
#[derive(Default)]
struct Jar(BTreeMap<String, String>);

impl Jar {
    fn store(&mut self, response: &Response) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            if value.is_empty() {
                self.0.remove(name);
            } else {
                self.0.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    fn header(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

async fn send(
    app: &Router,
    jar: &mut Jar,
    method: Method,
    uri: &str,
    form: Option<&str>,
    htmx: bool,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if !jar.0.is_empty() {
        builder = builder.header(header::COOKIE, jar.header());
    }
    if htmx {
        builder = builder.header("hx-request", "true");
    }
    let body = match form {
        Some(form) => {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            Body::from(form.to_owned())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    jar.store(&response);
    response
}

async fn get(app: &Router, jar: &mut Jar, uri: &str) -> Response {
    send(app, jar, Method::GET, uri, None, false).await
}

async fn post(app: &Router, jar: &mut Jar, uri: &str, form: &str, htmx: bool) -> Response {
    send(app, jar, Method::POST, uri, Some(form), htmx).await
}

async fn text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = router();
    let response = get(&app, &mut Jar::default(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "ok");

    let response = get(&app, &mut Jar::default(), "/health/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_paths_redirect_to_login_with_return_url() {
    let app = router();
    let mut jar = Jar::default();

    let response = get(&app, &mut jar, "/profile").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?redirect=%2Fprofile");

    let response = get(&app, &mut jar, "/favorites?view=grid").await;
    assert_eq!(
        location(&response),
        "/auth/login?redirect=%2Ffavorites%3Fview%3Dgrid"
    );

    let response = post(&app, &mut jar, "/favorites/collections", "name=Balc%C3%B3n", false).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login?redirect="));
}

#[tokio::test]
async fn test_public_pages_are_not_gated() {
    let app = router();
    let mut jar = Jar::default();

    for uri in ["/", "/products", "/products/1", "/cart", "/auth/login"] {
        let response = get(&app, &mut jar, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_product_listing_shows_stock_and_issues_device_cookie() {
    let app = router();
    let mut jar = Jar::default();

    let response = get(&app, &mut jar, "/products").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(jar.0.contains_key("vivero_device"));
    assert_eq!(
        response.headers().get("x-frame-options").unwrap(),
        "DENY"
    );
    assert!(response.headers().contains_key("x-request-id"));

    let body = text(response).await;
    assert!(body.contains("<h3>Monstera</h3>"));
    assert!(body.contains("Agotado"));
}

#[tokio::test]
async fn test_product_listing_filters_by_search() {
    let app = router();
    let response = get(&app, &mut Jar::default(), "/products?q=maceta").await;
    let body = text(response).await;
    assert!(body.contains("<h3>Maceta de barro</h3>"));
    assert!(!body.contains("<h3>Monstera</h3>"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = router();
    let response = get(&app, &mut Jar::default(), "/products/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_to_cart_returns_badge_and_trigger() {
    let app = router();
    let mut jar = Jar::default();
    get(&app, &mut jar, "/products").await;

    let response = post(&app, &mut jar, "/cart/add", "product_id=1&quantity=2", true).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("hx-trigger").unwrap(), "cart-updated");
    assert!(text(response).await.contains(">2<"));

    let body = text(get(&app, &mut jar, "/cart").await).await;
    assert!(body.contains("Monstera"));
}

#[tokio::test]
async fn test_add_out_of_stock_shows_error_without_trigger() {
    let app = router();
    let mut jar = Jar::default();

    let response = post(&app, &mut jar, "/cart/add", "product_id=2", true).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("hx-trigger").is_none());
    assert!(text(response).await.contains("Pothos está agotado."));
}

#[tokio::test]
async fn test_plain_form_error_flashes_once_on_cart_page() {
    let app = router();
    let mut jar = Jar::default();

    let response = post(&app, &mut jar, "/cart/add", "product_id=2", false).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart");

    let body = text(get(&app, &mut jar, "/cart").await).await;
    assert!(body.contains("Pothos está agotado."));

    let body = text(get(&app, &mut jar, "/cart").await).await;
    assert!(!body.contains("Pothos está agotado."));
}

#[tokio::test]
async fn test_register_adopts_anonymous_cart_and_returns_to_checkout() {
    let app = router();
    let mut jar = Jar::default();
    post(&app, &mut jar, "/cart/add", "product_id=3", false).await;

    let response = post(
        &app,
        &mut jar,
        "/auth/register",
        "email=nueva%40example.com&password=hojas-verdes-9&password_confirmation=hojas-verdes-9&display_name=Nueva&redirect=%2Fcheckout",
        false,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/checkout");

    let response = get(&app, &mut jar, "/checkout").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(body.contains("Maceta de barro"));
    assert!(body.contains("nueva@example.com"));

    let response = post(&app, &mut jar, "/auth/logout", "", false).await;
    assert_eq!(location(&response), "/");
    let response = get(&app, &mut jar, "/checkout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_failed_login_returns_to_form_with_error() {
    let app = router();
    let mut jar = Jar::default();

    let response = post(
        &app,
        &mut jar,
        "/auth/login",
        "email=nadie%40example.com&password=incorrecta&redirect=%2Fprofile",
        false,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?redirect=%2Fprofile");

    let body = text(get(&app, &mut jar, "/auth/login?redirect=%2Fprofile").await).await;
    assert!(body.contains("Correo o contraseña incorrectos."));
}

#[tokio::test]
async fn test_login_rejects_offsite_redirect() {
    let app = router();
    let mut jar = Jar::default();

    let response = post(
        &app,
        &mut jar,
        "/auth/login",
        "email=nadie%40example.com&password=incorrecta&redirect=https%3A%2F%2Fevil.example",
        false,
    )
    .await;
    assert_eq!(location(&response), "/auth/login?redirect=%2F");
}

#[tokio::test]
async fn test_oauth_routes_are_not_found_when_unconfigured() {
    let app = router();
    let response = get(&app, &mut Jar::default(), "/auth/oauth/login").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forgot_password_answers_the_same_for_unknown_email() {
    let app = router();
    let mut jar = Jar::default();

    let response = post(
        &app,
        &mut jar,
        "/auth/forgot-password",
        "email=nadie%40example.com",
        false,
    )
    .await;
    assert_eq!(location(&response), "/auth/forgot-password?sent=1");
}

/// Log sink shared with a test subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.0))
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_sign_in_logs_user_id_but_not_email() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = router();
    let mut jar = Jar::default();
    let response = post(
        &app,
        &mut jar,
        "/auth/register",
        "email=privada%40example.com&password=hojas-verdes-9&password_confirmation=hojas-verdes-9&redirect=%2F",
        false,
    )
    .await;
    assert_eq!(location(&response), "/");

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Shopper signed in"));
    assert!(output.contains("user_id="));
    assert!(!output.contains("privada@example.com"));
}
