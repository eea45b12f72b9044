//! Cart service.
//!
//! Every mutation returns the owner's refreshed item list so callers can
//! replace their view of the cart in one step.

use thiserror::Error;
use tracing::{error, info, instrument, warn};
use vivero_core::{CartItemId, DeviceFingerprint, ProductId, UserId};

use crate::backend::{CartBackend, CatalogBackend};
use crate::db::RepositoryError;
use crate::models::{Cart, CartItem, Owner, Product};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("cart item {0} not found")]
    ItemNotFound(CartItemId),

    #[error("only {available} units of {product} in stock")]
    InsufficientStock { product: String, available: u32 },

    #[error("cart storage failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl CartError {
    /// Message safe to show in the cart drawer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuantity => "La cantidad debe ser al menos 1.".to_owned(),
            Self::ProductNotFound(_) => "Ese producto ya no está disponible.".to_owned(),
            Self::ItemNotFound(_) => "Ese artículo ya no está en tu carrito.".to_owned(),
            Self::InsufficientStock { product, available: 0 } => {
                format!("{product} está agotado.")
            }
            Self::InsufficientStock { product, available } => {
                format!("Solo quedan {available} unidades de {product}.")
            }
            Self::Repository(_) => "No se pudo actualizar el carrito.".to_owned(),
        }
    }
}

/// What a cart merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Anonymous lines folded into an existing line of the user cart.
    pub summed: usize,
    /// Anonymous lines inserted as new lines.
    pub inserted: usize,
}

impl MergeOutcome {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.summed == 0 && self.inserted == 0
    }
}

/// Cart operations for one owner at a time.
pub struct CartService<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B> CartService<'a, B>
where
    B: CartBackend + CatalogBackend + ?Sized,
{
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Items in the owner's cart; empty when the owner has no cart yet.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the backend fails.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn items(&self, owner: &Owner) -> Result<Vec<CartItem>, CartError> {
        let Some(cart) = self.backend.find_cart(owner).await.map_err(log_failure)? else {
            return Ok(Vec::new());
        };
        self.snapshot(&cart).await
    }

    /// Total units in the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the backend fails.
    pub async fn count(&self, owner: &Owner) -> Result<u32, CartError> {
        let items = self.items(owner).await?;
        Ok(items.iter().map(|item| item.quantity).sum())
    }

    /// Add `quantity` units of a product, creating the cart on first use.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity,
    /// `CartError::ProductNotFound` for an unknown product and
    /// `CartError::InsufficientStock` when the line would exceed stock.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn add(
        &self,
        owner: &Owner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let product = self
            .backend
            .get_product(product_id)
            .await
            .map_err(log_failure)?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let cart = self.find_or_create(owner).await?;
        let existing = self
            .backend
            .find_cart_item(cart.id, product_id)
            .await
            .map_err(log_failure)?;

        match existing {
            Some(item) => {
                let total = item.quantity.saturating_add(quantity);
                ensure_stock(&product, total)?;
                self.backend
                    .set_cart_item_quantity(item.id, total)
                    .await
                    .map_err(log_failure)?;
            }
            None => {
                ensure_stock(&product, quantity)?;
                self.backend
                    .insert_cart_item(cart.id, product_id, quantity)
                    .await
                    .map_err(log_failure)?;
            }
        }

        self.snapshot(&cart).await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the owner's
    /// cart and `CartError::InsufficientStock` when above stock.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn update(
        &self,
        owner: &Owner,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartError> {
        let (cart, item) = self.owned_item(owner, item_id).await?;

        if quantity == 0 {
            self.backend
                .delete_cart_item(item.id)
                .await
                .map_err(log_failure)?;
        } else {
            if let Some(product) = &item.product {
                ensure_stock(product, quantity)?;
            }
            self.backend
                .set_cart_item_quantity(item.id, quantity)
                .await
                .map_err(log_failure)?;
        }

        self.snapshot(&cart).await
    }

    /// Add one unit to a line.
    ///
    /// # Errors
    ///
    /// See [`Self::update`].
    pub async fn increment(
        &self,
        owner: &Owner,
        item_id: CartItemId,
    ) -> Result<Vec<CartItem>, CartError> {
        let (_, item) = self.owned_item(owner, item_id).await?;
        self.update(owner, item_id, item.quantity.saturating_add(1))
            .await
    }

    /// Take one unit off a line. A line at quantity 1 is left alone.
    ///
    /// # Errors
    ///
    /// See [`Self::update`].
    pub async fn decrement(
        &self,
        owner: &Owner,
        item_id: CartItemId,
    ) -> Result<Vec<CartItem>, CartError> {
        let (cart, item) = self.owned_item(owner, item_id).await?;
        if item.quantity <= 1 {
            return self.snapshot(&cart).await;
        }
        self.update(owner, item_id, item.quantity - 1).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the owner's cart.
    pub async fn remove(
        &self,
        owner: &Owner,
        item_id: CartItemId,
    ) -> Result<Vec<CartItem>, CartError> {
        self.update(owner, item_id, 0).await
    }

    /// Remove every line from the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the backend fails.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn clear(&self, owner: &Owner) -> Result<Vec<CartItem>, CartError> {
        if let Some(cart) = self.backend.find_cart(owner).await.map_err(log_failure)? {
            self.backend.clear_cart(cart.id).await.map_err(log_failure)?;
        }
        Ok(Vec::new())
    }

    /// Fold the anonymous cart of `device` into the cart of `user_id`.
    ///
    /// Lines for a product already in the user cart have their quantities
    /// summed; other lines are inserted. Each anonymous line is deleted as
    /// soon as it has been moved, so re-running after a partial failure
    /// never counts a line twice. The anonymous cart is deleted at the end.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if any backend call fails. Lines
    /// moved before the failure stay moved.
    #[instrument(skip(self), fields(user_id = %user_id, device = %device))]
    pub async fn migrate_cart(
        &self,
        user_id: UserId,
        device: &DeviceFingerprint,
    ) -> Result<MergeOutcome, CartError> {
        let anonymous_owner = Owner::Device(device.clone());
        let Some(anonymous) = self
            .backend
            .find_cart(&anonymous_owner)
            .await
            .map_err(log_failure)?
        else {
            return Ok(MergeOutcome::default());
        };

        let target = self.find_or_create(&Owner::User(user_id)).await?;
        let lines = self
            .backend
            .list_cart_items(anonymous.id)
            .await
            .map_err(log_failure)?;

        let mut outcome = MergeOutcome::default();
        for line in lines {
            let existing = self
                .backend
                .find_cart_item(target.id, line.product_id)
                .await
                .map_err(log_failure)?;

            match existing {
                Some(item) => {
                    self.backend
                        .set_cart_item_quantity(item.id, item.quantity.saturating_add(line.quantity))
                        .await
                        .map_err(log_failure)?;
                    outcome.summed += 1;
                }
                None => {
                    self.backend
                        .insert_cart_item(target.id, line.product_id, line.quantity)
                        .await
                        .map_err(log_failure)?;
                    outcome.inserted += 1;
                }
            }

            self.backend
                .delete_cart_item(line.id)
                .await
                .map_err(log_failure)?;
        }

        self.backend
            .delete_cart(anonymous.id)
            .await
            .map_err(log_failure)?;

        info!(
            summed = outcome.summed,
            inserted = outcome.inserted,
            "Merged anonymous cart"
        );
        Ok(outcome)
    }

    async fn find_or_create(&self, owner: &Owner) -> Result<Cart, CartError> {
        if let Some(cart) = self.backend.find_cart(owner).await.map_err(log_failure)? {
            return Ok(cart);
        }
        match self.backend.create_cart(owner).await {
            Ok(cart) => Ok(cart),
            // Lost a race with a concurrent request for the same owner.
            Err(RepositoryError::Conflict(_)) => self
                .backend
                .find_cart(owner)
                .await
                .map_err(log_failure)?
                .ok_or(CartError::Repository(RepositoryError::NotFound)),
            Err(e) => Err(log_failure(e).into()),
        }
    }

    async fn owned_item(
        &self,
        owner: &Owner,
        item_id: CartItemId,
    ) -> Result<(Cart, CartItem), CartError> {
        let cart = self
            .backend
            .find_cart(owner)
            .await
            .map_err(log_failure)?
            .ok_or(CartError::ItemNotFound(item_id))?;

        let item = self
            .backend
            .get_cart_item(item_id)
            .await
            .map_err(log_failure)?
            .filter(|item| item.cart_id == cart.id)
            .ok_or(CartError::ItemNotFound(item_id))?;

        Ok((cart, item))
    }

    async fn snapshot(&self, cart: &Cart) -> Result<Vec<CartItem>, CartError> {
        self.backend
            .list_cart_items(cart.id)
            .await
            .map_err(|e| CartError::from(log_failure(e)))
    }
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<(), CartError> {
    if quantity > product.stock {
        warn!(
            product_id = %product.id,
            requested = quantity,
            stock = product.stock,
            "Cart quantity exceeds stock"
        );
        return Err(CartError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
        });
    }
    Ok(())
}

fn log_failure(err: RepositoryError) -> RepositoryError {
    error!(error = %err, "Cart backend call failed");
    err
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::backend::fake::FakeBackend;

    fn device() -> DeviceFingerprint {
        DeviceFingerprint::parse("device-abc-123").unwrap()
    }

    fn anon() -> Owner {
        Owner::Device(device())
    }

    #[tokio::test]
    async fn test_add_creates_cart_and_line() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        let items = service.add(&anon(), ProductId::new(1), 2).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].product.as_ref().map(|p| p.name.as_str()), Some("Monstera"));
    }

    #[tokio::test]
    async fn test_add_twice_increments_existing_line() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        service.add(&anon(), ProductId::new(1), 1).await.unwrap();
        let items = service.add(&anon(), ProductId::new(1), 2).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(service.count(&anon()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_rejects_zero_and_out_of_stock() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        assert!(matches!(
            service.add(&anon(), ProductId::new(1), 0).await,
            Err(CartError::InvalidQuantity)
        ));
        assert!(matches!(
            service.add(&anon(), ProductId::new(2), 1).await,
            Err(CartError::InsufficientStock { available: 0, .. })
        ));
        assert!(matches!(
            service.add(&anon(), ProductId::new(1), 6).await,
            Err(CartError::InsufficientStock { available: 5, .. })
        ));
        assert!(matches!(
            service.add(&anon(), ProductId::new(404), 1).await,
            Err(CartError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_zero_removes_line() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        let items = service.add(&anon(), ProductId::new(3), 4).await.unwrap();
        let items = service.update(&anon(), items[0].id, 0).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_increment_stops_at_stock_and_decrement_at_one() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        let items = service.add(&anon(), ProductId::new(4), 1).await.unwrap();
        let id = items[0].id;

        let items = service.increment(&anon(), id).await.unwrap();
        assert_eq!(items[0].quantity, 2);
        assert!(matches!(
            service.increment(&anon(), id).await,
            Err(CartError::InsufficientStock { .. })
        ));

        service.decrement(&anon(), id).await.unwrap();
        let items = service.decrement(&anon(), id).await.unwrap();
        assert_eq!(items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_items_of_another_owner_are_not_found() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        let items = service.add(&anon(), ProductId::new(1), 1).await.unwrap();
        let other = Owner::User(UserId::new(7));
        service.add(&other, ProductId::new(3), 1).await.unwrap();

        assert!(matches!(
            service.remove(&other, items[0].id).await,
            Err(CartError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_empties_cart() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        service.add(&anon(), ProductId::new(1), 1).await.unwrap();
        service.add(&anon(), ProductId::new(3), 1).await.unwrap();
        service.clear(&anon()).await.unwrap();
        assert!(service.items(&anon()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_without_anonymous_cart_is_noop() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);

        let outcome = service.migrate_cart(UserId::new(7), &device()).await.unwrap();
        assert!(outcome.is_noop());
        assert!(backend.cart_quantities(&Owner::User(UserId::new(7))).await.is_none());
    }

    #[tokio::test]
    async fn test_migrate_creates_user_cart_when_missing() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);
        service.add(&anon(), ProductId::new(1), 2).await.unwrap();

        let outcome = service.migrate_cart(UserId::new(7), &device()).await.unwrap();
        assert_eq!(outcome, MergeOutcome { summed: 0, inserted: 1 });

        let user_cart = backend
            .cart_quantities(&Owner::User(UserId::new(7)))
            .await
            .unwrap();
        assert_eq!(user_cart, HashMap::from([(ProductId::new(1), 2)]));
        assert!(backend.cart_quantities(&anon()).await.is_none());
    }

    #[tokio::test]
    async fn test_migrate_sums_matching_lines_without_clamping() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);
        let user = Owner::User(UserId::new(7));

        service.add(&user, ProductId::new(1), 4).await.unwrap();
        service.add(&anon(), ProductId::new(1), 3).await.unwrap();
        service.add(&anon(), ProductId::new(3), 1).await.unwrap();

        let outcome = service.migrate_cart(UserId::new(7), &device()).await.unwrap();
        assert_eq!(outcome, MergeOutcome { summed: 1, inserted: 1 });

        let user_cart = backend.cart_quantities(&user).await.unwrap();
        assert_eq!(
            user_cart,
            HashMap::from([(ProductId::new(1), 7), (ProductId::new(3), 1)])
        );
    }

    #[tokio::test]
    async fn test_migrate_retry_after_failure_does_not_double_count() {
        let backend = FakeBackend::seeded();
        let service = CartService::new(&backend);
        let user = Owner::User(UserId::new(7));

        service.add(&user, ProductId::new(1), 1).await.unwrap();
        service.add(&anon(), ProductId::new(1), 2).await.unwrap();

        backend.fail("delete_cart").await;
        assert!(service.migrate_cart(UserId::new(7), &device()).await.is_err());
        backend.failing.lock().await.clear();

        service.migrate_cart(UserId::new(7), &device()).await.unwrap();
        let user_cart = backend.cart_quantities(&user).await.unwrap();
        assert_eq!(user_cart, HashMap::from([(ProductId::new(1), 3)]));
        assert!(backend.cart_quantities(&anon()).await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_reported() {
        let backend = FakeBackend::seeded();
        backend.fail("find_cart").await;
        let service = CartService::new(&backend);

        assert!(matches!(
            service.items(&anon()).await,
            Err(CartError::Repository(_))
        ));
    }
}
