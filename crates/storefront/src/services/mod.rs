//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password sign-up/sign-in, password reset, OAuth identity linking
//! - `catalog` - Categories and products, with a short TTL cache
//! - `cart` - Cart lines, stock checks, anonymous cart merge
//! - `favorites` - Favorite collections, anonymous favorites merge
//! - `email` - Password reset mail over SMTP
//! - `oauth` - Authorization-code client for the external sign-in provider
//!
//! Services borrow a backend (`&B` where `B` implements the relevant
//! [`crate::backend`] traits) and are cheap to construct per request.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod email;
pub mod favorites;
pub mod oauth;

use tracing::warn;
use vivero_core::{DeviceFingerprint, UserId};

use crate::backend::Backend;

/// Move the anonymous cart and favorites of `device` to `user_id`.
///
/// Runs after every sign-in. Failures are logged and swallowed so a merge
/// problem never blocks signing in.
pub async fn adopt_device_data<B: Backend + ?Sized>(
    backend: &B,
    user_id: UserId,
    device: &DeviceFingerprint,
) {
    if let Err(e) = cart::CartService::new(backend)
        .migrate_cart(user_id, device)
        .await
    {
        warn!(error = %e, user_id = %user_id, "Cart migration failed");
    }

    if let Err(e) = favorites::FavoritesService::new(backend)
        .migrate_favorites(user_id, device)
        .await
    {
        warn!(error = %e, user_id = %user_id, "Favorites migration failed");
    }
}

#[cfg(test)]
mod tests {
    use vivero_core::ProductId;

    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::models::Owner;

    #[tokio::test]
    async fn test_adopt_device_data_moves_cart_and_favorites() {
        let backend = FakeBackend::seeded();
        let device = DeviceFingerprint::parse("device-abc-123").unwrap();
        let anon = Owner::Device(device.clone());
        let user = Owner::User(UserId::new(9));

        cart::CartService::new(&backend)
            .add(&anon, ProductId::new(1), 1)
            .await
            .unwrap();
        favorites::FavoritesService::new(&backend)
            .toggle(&anon, None, ProductId::new(3))
            .await
            .unwrap();

        adopt_device_data(&backend, UserId::new(9), &device).await;

        assert!(backend.cart_quantities(&user).await.is_some());
        let collections = favorites::FavoritesService::new(&backend)
            .list(&user)
            .await
            .unwrap();
        assert_eq!(collections.len(), 1);
    }

    #[tokio::test]
    async fn test_adopt_device_data_swallows_failures() {
        let backend = FakeBackend::seeded();
        backend.fail("find_cart").await;
        backend.fail("list_collections").await;
        let device = DeviceFingerprint::parse("device-abc-123").unwrap();

        adopt_device_data(&backend, UserId::new(9), &device).await;
    }
}
