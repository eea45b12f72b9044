//! Data access seam between the services and the relational store.
//!
//! Services are generic over these traits so they run against
//! [`crate::db::PgBackend`] in production and against an in-memory fake in
//! tests. Each trait covers one group of tables:
//!
//! - [`CatalogBackend`] - `categories`, `products`
//! - [`CartBackend`] - `carts`, `cart_items`
//! - [`FavoritesBackend`] - `favorite_collections`, `favorite_items`
//! - [`AccountBackend`] - `users`, `user_passwords`, `password_reset_tokens`, `oauth_identities`
//!
//! Methods are single statements; sequencing (merges, upserts, stock checks)
//! lives in [`crate::services`].

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vivero_core::{CartId, CartItemId, CollectionId, Email, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{
    Cart, CartItem, Category, FavoriteCollection, FavoriteItem, Owner, Product, ProductFilter,
    User,
};

/// Read access to the catalog.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// All categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Products matching `filter`, ordered by name, with their category joined.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    /// One product with its category joined.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Cart and cart item rows.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// The cart owned by `owner`, if one exists.
    async fn find_cart(&self, owner: &Owner) -> Result<Option<Cart>, RepositoryError>;

    /// Create an empty cart for `owner`.
    async fn create_cart(&self, owner: &Owner) -> Result<Cart, RepositoryError>;

    /// Delete a cart and (by cascade) its items.
    async fn delete_cart(&self, id: CartId) -> Result<(), RepositoryError>;

    /// Items in a cart ordered by insertion, with products joined.
    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError>;

    /// The line for `product_id` in `cart_id`, if present.
    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// One line by id, with its product joined.
    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError>;

    /// Insert a new line.
    async fn insert_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError>;

    /// Overwrite a line's quantity.
    ///
    /// Returns `RepositoryError::NotFound` when the line does not exist.
    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    /// Delete a line. Returns whether a row was removed.
    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, RepositoryError>;

    /// Delete every line in a cart.
    async fn clear_cart(&self, cart_id: CartId) -> Result<(), RepositoryError>;
}

/// Favorite collection and item rows.
#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    /// Collections owned by `owner` ordered by creation, items and products joined.
    async fn list_collections(
        &self,
        owner: &Owner,
    ) -> Result<Vec<FavoriteCollection>, RepositoryError>;

    /// One collection with items and products joined.
    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<FavoriteCollection>, RepositoryError>;

    /// Create an empty collection.
    async fn create_collection(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<FavoriteCollection, RepositoryError>;

    /// Rename a collection.
    ///
    /// Returns `RepositoryError::NotFound` when the collection does not exist.
    async fn rename_collection(&self, id: CollectionId, name: &str)
    -> Result<(), RepositoryError>;

    /// Delete a collection and (by cascade) its items. Returns whether a row was removed.
    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError>;

    /// Hand a collection over to another owner.
    async fn transfer_collection(
        &self,
        id: CollectionId,
        owner: &Owner,
    ) -> Result<(), RepositoryError>;

    /// Add a product to a collection.
    ///
    /// Returns `RepositoryError::Conflict` when it is already there.
    async fn insert_favorite_item(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<FavoriteItem, RepositoryError>;

    /// Remove a product from a collection. Returns whether a row was removed.
    async fn delete_favorite_item(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;
}

/// Shopper accounts and their credentials.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    /// Look up a user by email.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Look up a user by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Create a user, optionally with a password hash.
    ///
    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create_user(
        &self,
        email: &Email,
        display_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError>;

    /// The user and their password hash. `None` if unknown or passwordless.
    async fn password_hash(&self, email: &Email)
    -> Result<Option<(User, String)>, RepositoryError>;

    /// Set or replace a user's password hash.
    async fn set_password_hash(&self, id: UserId, password_hash: &str)
    -> Result<(), RepositoryError>;

    /// Store a password reset token digest.
    async fn create_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Mark an unused, unexpired token as used and return its user.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError>;

    /// The user linked to a provider subject.
    async fn find_oauth_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<UserId>, RepositoryError>;

    /// Link a provider subject to a user.
    async fn link_oauth_identity(
        &self,
        provider: &str,
        subject: &str,
        user_id: UserId,
    ) -> Result<(), RepositoryError>;
}

/// Everything the storefront needs from its data store.
#[async_trait]
pub trait Backend: CatalogBackend + CartBackend + FavoritesBackend + AccountBackend {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
