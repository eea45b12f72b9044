//! Integration tests for the Vivero storefront.
//!
//! These run over HTTP against a live server backed by a migrated and
//! seeded database, so every test is `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p vivero-cli -- migrate
//! cargo run -p vivero-cli -- seed catalog crates/cli/seeds/catalog.yaml
//! cargo run -p vivero-storefront &
//! cargo test -p vivero-integration-tests -- --ignored
//! ```
//!
//! Set `STOREFRONT_BASE_URL` to target another host.

use reqwest::{Client, redirect};

/// Base URL for the storefront (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A browser-like client: keeps cookies, does not follow redirects so
/// tests can assert on `Location`.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// A fresh address so sign-up tests never collide.
#[must_use]
pub fn unique_email() -> String {
    format!("prueba-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// The `Location` header of a redirect response.
///
/// # Panics
///
/// Panics if the response has no readable `Location` header.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .expect("non-ASCII Location")
        .to_owned()
}
