//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (backend ping)
//! GET  /                       - Product listing (home)
//!
//! # Products
//! GET  /products               - Product listing (?category=&kind=&q=)
//! GET  /products/{id}          - Product detail
//! POST /products/{id}/favorite - Toggle in the active collection
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /cart/add               - Add to cart (returns badge, triggers cart-updated)
//! POST /cart/update            - Set quantity (returns cart_items fragment)
//! POST /cart/increment         - +1 (returns cart_items fragment)
//! POST /cart/decrement         - -1 (returns cart_items fragment)
//! POST /cart/remove            - Remove line (returns cart_items fragment)
//! POST /cart/clear             - Empty the cart (returns cart_items fragment)
//!
//! # Signed-in only (gated by `protected_paths_middleware`)
//! GET  /checkout               - Order summary
//! GET  /profile                - Account overview
//! GET  /favorites              - Collections
//! POST /favorites/collections              - Create
//! POST /favorites/collections/{id}/rename  - Rename
//! POST /favorites/collections/{id}/delete  - Delete
//! POST /favorites/collections/{id}/activate - Make active
//! POST /favorites/items                    - Add product (drag and drop)
//! POST /favorites/items/remove             - Remove product
//!
//! # Auth
//! GET|POST /auth/login, /auth/register, /auth/forgot-password, /auth/reset-password
//! POST /auth/logout
//! GET  /auth/oauth/login       - Redirect to the OAuth provider
//! GET  /auth/oauth/callback    - Handle the provider callback
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod favorites;
pub mod oauth;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::models::Owner;
use crate::state::AppState;
use crate::store::{CartAction, Status, Store, thunks};

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password),
        )
        .route(
            "/reset-password",
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route("/oauth/login", get(oauth::login))
        .route("/oauth/callback", get(oauth::callback))
        .layer(auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route("/{id}/favorite", post(products::toggle_favorite))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the favorites routes router.
pub fn favorites_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index))
        .route("/collections", post(favorites::create))
        .route("/collections/{id}/rename", post(favorites::rename))
        .route("/collections/{id}/delete", post(favorites::delete))
        .route("/collections/{id}/activate", post(favorites::activate))
        .route("/items", post(favorites::add_item))
        .route("/items/remove", post(favorites::remove_item))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/", get(products::index))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(cart::checkout))
        .route("/profile", get(account::profile))
        .nest("/favorites", favorites_routes())
        .nest("/auth", auth_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the backend is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.backend().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Whether the request was issued by htmx and expects a fragment.
pub(crate) fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Load the cart for the header badge unless the session already has it.
pub(crate) async fn ensure_cart(state: &AppState, store: &mut Store, owner: &Owner) {
    if store.cart.status != Status::Succeeded {
        store.dispatch(CartAction::Pending);
        store.dispatch(thunks::fetch_cart(state.backend(), owner).await);
    }
}

#[cfg(test)]
pub(crate) mod tests;
