//! Async action creators.
//!
//! Each thunk calls one service operation and turns the outcome into the
//! fulfilled or rejected action of its slice. Errors become the
//! user-facing message of the service error; details stay in the logs.

use vivero_core::{CartItemId, CollectionId, DeviceFingerprint, ProductId};

use super::{AuthAction, CartAction, ProductsAction};
use crate::backend::Backend;
use crate::models::{CurrentUser, OAuthProfile, Owner, ProductFilter};
use crate::services::adopt_device_data;
use crate::services::auth::{AuthService, Registration};
use crate::services::cart::CartService;
use crate::services::catalog::{CatalogCache, CatalogService};
use crate::services::email::EmailService;
use crate::services::favorites::FavoritesService;

// =============================================================================
// Catalog
// =============================================================================

pub async fn fetch_products<B: Backend + ?Sized>(
    backend: &B,
    cache: &CatalogCache,
    filter: &ProductFilter,
) -> ProductsAction {
    match CatalogService::new(backend, cache).products(filter).await {
        Ok(products) => ProductsAction::ProductsLoaded(products.as_ref().clone()),
        Err(e) => ProductsAction::Rejected(e.user_message()),
    }
}

pub async fn fetch_categories<B: Backend + ?Sized>(
    backend: &B,
    cache: &CatalogCache,
) -> ProductsAction {
    match CatalogService::new(backend, cache).categories().await {
        Ok(categories) => ProductsAction::CategoriesLoaded(categories.as_ref().clone()),
        Err(e) => ProductsAction::Rejected(e.user_message()),
    }
}

pub async fn fetch_product<B: Backend + ?Sized>(
    backend: &B,
    cache: &CatalogCache,
    id: ProductId,
) -> ProductsAction {
    match CatalogService::new(backend, cache).product(id).await {
        Ok(product) => ProductsAction::ProductLoaded(product),
        Err(e) => ProductsAction::Rejected(e.user_message()),
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Which cart mutation to run.
#[derive(Debug, Clone, Copy)]
pub enum CartChange {
    Add { product_id: ProductId, quantity: u32 },
    Update { item_id: CartItemId, quantity: u32 },
    Increment(CartItemId),
    Decrement(CartItemId),
    Remove(CartItemId),
    Clear,
}

pub async fn fetch_cart<B: Backend + ?Sized>(backend: &B, owner: &Owner) -> CartAction {
    match CartService::new(backend).items(owner).await {
        Ok(items) => CartAction::Loaded(items),
        Err(e) => CartAction::Rejected(e.user_message()),
    }
}

pub async fn change_cart<B: Backend + ?Sized>(
    backend: &B,
    owner: &Owner,
    change: CartChange,
) -> CartAction {
    let service = CartService::new(backend);
    let result = match change {
        CartChange::Add {
            product_id,
            quantity,
        } => service.add(owner, product_id, quantity).await,
        CartChange::Update { item_id, quantity } => {
            service.update(owner, item_id, quantity).await
        }
        CartChange::Increment(item_id) => service.increment(owner, item_id).await,
        CartChange::Decrement(item_id) => service.decrement(owner, item_id).await,
        CartChange::Remove(item_id) => service.remove(owner, item_id).await,
        CartChange::Clear => service.clear(owner).await,
    };

    match result {
        Ok(items) => CartAction::Loaded(items),
        Err(e) => CartAction::Rejected(e.user_message()),
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// Which favorites mutation to run.
#[derive(Debug, Clone)]
pub enum FavoritesChange {
    Create(String),
    Rename(CollectionId, String),
    Delete(CollectionId),
    AddItem(CollectionId, ProductId),
    RemoveItem(CollectionId, ProductId),
}

pub async fn fetch_collections<B: Backend + ?Sized>(backend: &B, owner: &Owner) -> ProductsAction {
    match FavoritesService::new(backend).list(owner).await {
        Ok(collections) => ProductsAction::CollectionsLoaded(collections),
        Err(e) => ProductsAction::Rejected(e.user_message()),
    }
}

pub async fn change_favorites<B: Backend + ?Sized>(
    backend: &B,
    owner: &Owner,
    change: FavoritesChange,
) -> ProductsAction {
    let service = FavoritesService::new(backend);
    let result = match change {
        FavoritesChange::Create(name) => match service.create(owner, &name).await {
            Ok(created) => {
                return match service.list(owner).await {
                    Ok(collections) => ProductsAction::FavoriteToggled {
                        collections,
                        collection_id: created.id,
                    },
                    Err(e) => ProductsAction::Rejected(e.user_message()),
                };
            }
            Err(e) => Err(e),
        },
        FavoritesChange::Rename(id, name) => service.rename(owner, id, &name).await,
        FavoritesChange::Delete(id) => service.delete(owner, id).await,
        FavoritesChange::AddItem(id, product_id) => service.add_item(owner, id, product_id).await,
        FavoritesChange::RemoveItem(id, product_id) => {
            service.remove_item(owner, id, product_id).await
        }
    };

    match result {
        Ok(collections) => ProductsAction::CollectionsLoaded(collections),
        Err(e) => ProductsAction::Rejected(e.user_message()),
    }
}

pub async fn toggle_favorite<B: Backend + ?Sized>(
    backend: &B,
    owner: &Owner,
    active: Option<CollectionId>,
    product_id: ProductId,
) -> ProductsAction {
    match FavoritesService::new(backend)
        .toggle(owner, active, product_id)
        .await
    {
        Ok(toggled) => ProductsAction::FavoriteToggled {
            collections: toggled.collections,
            collection_id: toggled.collection_id,
        },
        Err(e) => ProductsAction::Rejected(e.user_message()),
    }
}

// =============================================================================
// Auth
// =============================================================================

/// Sign in with email and password, then adopt the device's cart and favorites.
pub async fn sign_in<B: Backend + ?Sized>(
    backend: &B,
    email: &str,
    password: &str,
    device: &DeviceFingerprint,
) -> AuthAction {
    match AuthService::new(backend).login(email, password).await {
        Ok(user) => {
            adopt_device_data(backend, user.id, device).await;
            AuthAction::SignedIn(CurrentUser::from(&user))
        }
        Err(e) => AuthAction::Rejected(e.user_message()),
    }
}

/// Create an account, sign it in and adopt the device's cart and favorites.
pub async fn sign_up<B: Backend + ?Sized>(
    backend: &B,
    form: &Registration<'_>,
    device: &DeviceFingerprint,
) -> AuthAction {
    match AuthService::new(backend).register(form).await {
        Ok(user) => {
            adopt_device_data(backend, user.id, device).await;
            AuthAction::SignedIn(CurrentUser::from(&user))
        }
        Err(e) => AuthAction::Rejected(e.user_message()),
    }
}

/// Resolve an OAuth identity to a user and sign it in.
pub async fn oauth_sign_in<B: Backend + ?Sized>(
    backend: &B,
    profile: &OAuthProfile,
    device: &DeviceFingerprint,
) -> AuthAction {
    match AuthService::new(backend).oauth_sign_in(profile).await {
        Ok(user) => {
            adopt_device_data(backend, user.id, device).await;
            AuthAction::SignedIn(CurrentUser::from(&user))
        }
        Err(e) => AuthAction::Rejected(e.user_message()),
    }
}

/// Issue and deliver a reset link.
///
/// Always resolves to [`AuthAction::ResetRequested`] so the response does
/// not reveal whether the address has an account. Without a mailer the
/// link is logged.
pub async fn request_password_reset<B: Backend + ?Sized>(
    backend: &B,
    mailer: Option<&EmailService>,
    base_url: &str,
    email: &str,
) -> AuthAction {
    let request = match AuthService::new(backend).request_password_reset(email).await {
        Ok(Some(request)) => request,
        Ok(None) => return AuthAction::ResetRequested,
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue password reset token");
            return AuthAction::ResetRequested;
        }
    };

    let reset_url = format!(
        "{base_url}/auth/reset-password?token={}",
        urlencoding::encode(&request.token)
    );
    let name = CurrentUser::from(&request.user).greeting_name().to_owned();

    match mailer {
        Some(mailer) => {
            if let Err(e) = mailer
                .send_password_reset(request.user.email.as_str(), &name, &reset_url)
                .await
            {
                tracing::warn!(error = %e, user_id = %request.user.id, "Failed to send password reset email");
            }
        }
        None => {
            tracing::info!(user_id = %request.user.id, reset_url = %reset_url, "SMTP not configured; password reset link");
        }
    }

    AuthAction::ResetRequested
}

/// Set a new password from a reset link and sign the user in.
pub async fn reset_password<B: Backend + ?Sized>(
    backend: &B,
    token: &str,
    password: &str,
    password_confirmation: &str,
    device: &DeviceFingerprint,
) -> AuthAction {
    match AuthService::new(backend)
        .reset_password(token, password, password_confirmation)
        .await
    {
        Ok(user) => {
            adopt_device_data(backend, user.id, device).await;
            AuthAction::SignedIn(CurrentUser::from(&user))
        }
        Err(e) => AuthAction::Rejected(e.user_message()),
    }
}
