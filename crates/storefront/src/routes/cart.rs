//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Plain form posts (no JavaScript) redirect back to `/cart`, where the
//! store's error, if any, is shown once.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use vivero_core::{CartItemId, ProductId};

use super::is_htmx;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{CurrentOwner, RequireAuth};
use crate::state::AppState;
use crate::store::thunks::{self, CartChange};
use crate::store::{CartAction, Store};
use crate::views::{CartView, LayoutView};

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<u32>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: i32,
    pub quantity: u32,
}

/// Form data naming one cart line.
#[derive(Debug, Deserialize)]
pub struct CartItemForm {
    pub item_id: i32,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: LayoutView,
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
    pub error: Option<String>,
}

/// Checkout summary template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub layout: LayoutView,
    pub cart: CartView,
    pub email: String,
}

/// Display cart page.
#[instrument(skip(state, session, owner))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
) -> Result<CartShowTemplate> {
    let mut store = Store::load(&session).await;
    let flash = store.take_flash();
    store.dispatch(CartAction::Pending);
    store.dispatch(thunks::fetch_cart(state.backend(), &owner.owner).await);

    let template = CartShowTemplate {
        cart: CartView::new(&store.cart.items, state.config().currency),
        layout: LayoutView::from_store(&mut store, None),
        error: flash,
    };

    store.save(&session).await?;
    Ok(template)
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session, owner))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
) -> Result<CartCountTemplate> {
    let mut store = Store::load(&session).await;
    store.dispatch(thunks::fetch_cart(state.backend(), &owner.owner).await);

    let template = CartCountTemplate {
        count: store.cart.item_count,
        error: None,
    };

    store.save(&session).await?;
    Ok(template)
}

/// Add a product to the cart.
///
/// HTMX requests get the badge back; on success a `cart-updated` trigger
/// lets other fragments refresh.
#[instrument(skip(state, session, owner, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let change = CartChange::Add {
        product_id: ProductId::new(form.product_id),
        quantity: form.quantity.unwrap_or(1),
    };
    let mut store = apply(&state, &session, &owner, change).await;
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &form.product_id.to_string())]),
    );

    let response = if is_htmx(&headers) {
        let error = store.cart.take_error();
        let badge = CartCountTemplate {
            count: store.cart.item_count,
            error: error.clone(),
        };
        if error.is_some() {
            badge.into_response()
        } else {
            (AppendHeaders([("HX-Trigger", "cart-updated")]), badge).into_response()
        }
    } else {
        Redirect::to("/cart").into_response()
    };

    store.save(&session).await?;
    Ok(response)
}

/// Set a line's quantity; zero removes the line.
#[instrument(skip(state, session, owner, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let change = CartChange::Update {
        item_id: CartItemId::new(form.item_id),
        quantity: form.quantity,
    };
    let store = apply(&state, &session, &owner, change).await;
    respond_with_items(&state, &session, &owner, &headers, store).await
}

/// Add one unit to a line.
#[instrument(skip(state, session, owner, headers))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<CartItemForm>,
) -> Result<Response> {
    let change = CartChange::Increment(CartItemId::new(form.item_id));
    let store = apply(&state, &session, &owner, change).await;
    respond_with_items(&state, &session, &owner, &headers, store).await
}

/// Remove one unit from a line (never below one).
#[instrument(skip(state, session, owner, headers))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<CartItemForm>,
) -> Result<Response> {
    let change = CartChange::Decrement(CartItemId::new(form.item_id));
    let store = apply(&state, &session, &owner, change).await;
    respond_with_items(&state, &session, &owner, &headers, store).await
}

/// Remove a line.
#[instrument(skip(state, session, owner, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<CartItemForm>,
) -> Result<Response> {
    let change = CartChange::Remove(CartItemId::new(form.item_id));
    let store = apply(&state, &session, &owner, change).await;
    respond_with_items(&state, &session, &owner, &headers, store).await
}

/// Empty the cart.
#[instrument(skip(state, session, owner, headers))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
) -> Result<Response> {
    let store = apply(&state, &session, &owner, CartChange::Clear).await;
    respond_with_items(&state, &session, &owner, &headers, store).await
}

/// Order summary for the signed-in shopper.
#[instrument(skip(state, session, owner, user))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    owner: CurrentOwner,
) -> Result<Response> {
    let mut store = Store::load(&session).await;
    let flash = store.take_flash();
    store.dispatch(CartAction::Pending);
    store.dispatch(thunks::fetch_cart(state.backend(), &owner.owner).await);

    if store.cart.items.is_empty() {
        store.save(&session).await?;
        return Ok(Redirect::to("/cart").into_response());
    }

    let template = CheckoutTemplate {
        cart: CartView::new(&store.cart.items, state.config().currency),
        layout: LayoutView::from_store(&mut store, flash),
        email: user.email.to_string(),
    };

    store.save(&session).await?;
    Ok(template.into_response())
}

/// Run one cart mutation against the session's store.
async fn apply(state: &AppState, session: &Session, owner: &CurrentOwner, change: CartChange) -> Store {
    let mut store = Store::load(session).await;
    store.dispatch(CartAction::Pending);
    store.dispatch(thunks::change_cart(state.backend(), &owner.owner, change).await);
    store
}

/// Items fragment for HTMX, redirect to the cart page otherwise.
///
/// A rejected change leaves the store without lines, so they are reloaded
/// after the error is taken for display.
async fn respond_with_items(
    state: &AppState,
    session: &Session,
    owner: &CurrentOwner,
    headers: &HeaderMap,
    mut store: Store,
) -> Result<Response> {
    let response = if is_htmx(headers) {
        let error = store.cart.take_error();
        if error.is_some() {
            store.dispatch(thunks::fetch_cart(state.backend(), &owner.owner).await);
        }
        let fragment = CartItemsTemplate {
            cart: CartView::new(&store.cart.items, state.config().currency),
            error,
        };
        (AppendHeaders([("HX-Trigger", "cart-updated")]), fragment).into_response()
    } else {
        Redirect::to("/cart").into_response()
    };

    store.save(session).await?;
    Ok(response)
}
