//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use vivero_core::{CategoryId, CategoryKind, ProductId};

use super::{ensure_cart, is_htmx};
use crate::error::Result;
use crate::middleware::CurrentOwner;
use crate::models::ProductFilter;
use crate::services::catalog::CatalogService;
use crate::state::AppState;
use crate::store::{ProductsAction, Store, thunks};
use crate::views::{CategoryView, KindView, LayoutView, ProductCardView, favorite_ids};

/// Listing query string.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<i32>,
    pub kind: Option<String>,
    pub q: Option<String>,
}

impl ProductQuery {
    /// Unknown kinds and blank searches are ignored.
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            category_id: self.category.map(CategoryId::new),
            kind: self.kind.as_deref().and_then(|k| k.parse().ok()),
            search: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_owned),
        }
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: LayoutView,
    pub categories: Vec<CategoryView>,
    pub products: Vec<ProductCardView>,
    pub kinds: Vec<KindView>,
    pub selected_category: Option<CategoryId>,
    pub selected_kind: Option<&'static str>,
    pub search: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: LayoutView,
    pub product: ProductCardView,
}

/// Just what the favorite button needs.
pub struct FavoriteButtonView {
    pub id: ProductId,
    pub favorited: bool,
}

/// Favorite toggle fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorite_button.html")]
pub struct FavoriteButtonTemplate {
    pub product: FavoriteButtonView,
}

/// Display the product listing.
#[instrument(skip(state, session, owner))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    Query(query): Query<ProductQuery>,
) -> Result<ProductsIndexTemplate> {
    let filter = query.filter();
    let backend = state.backend();
    let cache = state.catalog_cache();
    let mut store = Store::load(&session).await;
    let flash = store.take_flash();

    // Products last: a later success would clear an earlier listing error.
    store.dispatch(ProductsAction::Pending);
    store.dispatch(thunks::fetch_collections(backend, &owner.owner).await);
    store.dispatch(thunks::fetch_categories(backend, cache).await);
    store.dispatch(thunks::fetch_products(backend, cache, &filter).await);
    ensure_cart(&state, &mut store, &owner.owner).await;

    let currency = state.config().currency;
    let favorites = favorite_ids(&store.products.collections);
    let template = ProductsIndexTemplate {
        categories: CategoryView::list(&store.products.categories, filter.category_id),
        products: ProductCardView::list(&store.products.products, currency, &favorites),
        kinds: KindView::all(filter.kind),
        selected_category: filter.category_id,
        selected_kind: filter.kind.map(CategoryKind::as_str),
        search: filter.search.unwrap_or_default(),
        layout: LayoutView::from_store(&mut store, flash),
    };

    store.save(&session).await?;
    Ok(template)
}

/// Display a product detail page.
#[instrument(skip(state, session, owner))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    Path(id): Path<i32>,
) -> Result<ProductShowTemplate> {
    let product = CatalogService::new(state.backend(), state.catalog_cache())
        .product(ProductId::new(id))
        .await?;

    let mut store = Store::load(&session).await;
    let flash = store.take_flash();
    store.dispatch(ProductsAction::Pending);
    store.dispatch(thunks::fetch_collections(state.backend(), &owner.owner).await);
    ensure_cart(&state, &mut store, &owner.owner).await;

    let favorites = favorite_ids(&store.products.collections);
    let card = ProductCardView::new(&product, state.config().currency, &favorites);
    store.dispatch(ProductsAction::ProductLoaded(product));

    let template = ProductShowTemplate {
        layout: LayoutView::from_store(&mut store, flash),
        product: card,
    };

    store.save(&session).await?;
    Ok(template)
}

/// Toggle a product in the active favorites collection.
///
/// HTMX requests get the updated button; plain forms go back to the product.
#[instrument(skip(state, session, owner, headers))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    session: Session,
    owner: CurrentOwner,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let mut store = Store::load(&session).await;

    store.dispatch(ProductsAction::Pending);
    let active = store.products.active_collection;
    store.dispatch(thunks::toggle_favorite(state.backend(), &owner.owner, active, product_id).await);

    let response = if is_htmx(&headers) {
        FavoriteButtonTemplate {
            product: FavoriteButtonView {
                id: product_id,
                favorited: favorite_ids(&store.products.collections).contains(&product_id),
            },
        }
        .into_response()
    } else {
        Redirect::to(&format!("/products/{id}")).into_response()
    };

    store.save(&session).await?;
    Ok(response)
}
