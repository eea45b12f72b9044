//! Favorites route handlers.
//!
//! Every path here sits behind `protected_paths_middleware`, so the owner is
//! always the signed-in user. HTMX requests get the collections fragment
//! back; plain forms redirect to `/favorites`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use vivero_core::{CollectionId, ProductId};

use super::{ensure_cart, is_htmx};
use crate::error::Result;
use crate::middleware::CurrentOwner;
use crate::state::AppState;
use crate::store::thunks::{self, FavoritesChange};
use crate::store::{ProductsAction, Store};
use crate::views::{CollectionView, LayoutView};

/// Create or rename form data.
#[derive(Debug, Deserialize)]
pub struct CollectionForm {
    pub name: String,
}

/// A product within a collection.
#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub collection_id: i32,
    pub product_id: i32,
}

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "favorites/index.html")]
pub struct FavoritesTemplate {
    pub layout: LayoutView,
    pub collections: Vec<CollectionView>,
    pub error: Option<String>,
}

/// Collections fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorites_collections.html")]
pub struct FavoritesCollectionsTemplate {
    pub collections: Vec<CollectionView>,
    pub error: Option<String>,
}

/// Display the shopper's collections.
#[instrument(skip(state, session, owner))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
) -> Result<FavoritesTemplate> {
    let mut store = Store::load(&session).await;
    let flash = store.take_flash();
    ensure_cart(&state, &mut store, &owner.owner).await;
    store.dispatch(ProductsAction::Pending);
    store.dispatch(thunks::fetch_collections(state.backend(), &owner.owner).await);

    let collections = CollectionView::list(
        &store.products.collections,
        store.products.active_collection,
        state.config().currency,
    );
    let template = FavoritesTemplate {
        layout: LayoutView::from_store(&mut store, flash),
        collections,
        error: None,
    };

    store.save(&session).await?;
    Ok(template)
}

/// Create a collection; it becomes the active one.
#[instrument(skip(state, session, owner, headers))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<CollectionForm>,
) -> Result<Response> {
    apply(&state, &session, &owner, &headers, FavoritesChange::Create(form.name)).await
}

/// Rename a collection.
#[instrument(skip(state, session, owner, headers))]
pub async fn rename(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Form(form): Form<CollectionForm>,
) -> Result<Response> {
    let change = FavoritesChange::Rename(CollectionId::new(id), form.name);
    apply(&state, &session, &owner, &headers, change).await
}

/// Delete a collection and everything saved in it.
#[instrument(skip(state, session, owner, headers))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let change = FavoritesChange::Delete(CollectionId::new(id));
    apply(&state, &session, &owner, &headers, change).await
}

/// Make a collection the target of favorite toggles.
#[instrument(skip(state, session, owner, headers))]
pub async fn activate(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let mut store = Store::load(&session).await;
    store.dispatch(ProductsAction::SetActiveCollection(Some(CollectionId::new(id))));
    store.dispatch(thunks::fetch_collections(state.backend(), &owner.owner).await);
    respond(&state, &session, &owner, &headers, store).await
}

/// Add a product to a collection (drag and drop target).
#[instrument(skip(state, session, owner, headers))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<ItemForm>,
) -> Result<Response> {
    let change = FavoritesChange::AddItem(
        CollectionId::new(form.collection_id),
        ProductId::new(form.product_id),
    );
    apply(&state, &session, &owner, &headers, change).await
}

/// Remove a product from a collection.
#[instrument(skip(state, session, owner, headers))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Form(form): Form<ItemForm>,
) -> Result<Response> {
    let change = FavoritesChange::RemoveItem(
        CollectionId::new(form.collection_id),
        ProductId::new(form.product_id),
    );
    apply(&state, &session, &owner, &headers, change).await
}

async fn apply(
    state: &AppState,
    session: &Session,
    owner: &CurrentOwner,
    headers: &HeaderMap,
    change: FavoritesChange,
) -> Result<Response> {
    let mut store = Store::load(session).await;
    store.dispatch(ProductsAction::Pending);
    store.dispatch(thunks::change_favorites(state.backend(), &owner.owner, change).await);
    respond(state, session, owner, headers, store).await
}

/// Collections fragment for HTMX, redirect to `/favorites` otherwise.
///
/// Collections are not kept in the session, so a rejected change reloads
/// them after its error is taken for display.
async fn respond(
    state: &AppState,
    session: &Session,
    owner: &CurrentOwner,
    headers: &HeaderMap,
    mut store: Store,
) -> Result<Response> {
    let response = if is_htmx(headers) {
        let error = store.products.take_error();
        if error.is_some() {
            store.dispatch(thunks::fetch_collections(state.backend(), &owner.owner).await);
        }
        FavoritesCollectionsTemplate {
            collections: CollectionView::list(
                &store.products.collections,
                store.products.active_collection,
                state.config().currency,
            ),
            error,
        }
        .into_response()
    } else {
        Redirect::to("/favorites").into_response()
    };

    store.save(session).await?;
    Ok(response)
}
