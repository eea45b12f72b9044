//! Favorites service: named collections of saved products.

use thiserror::Error;
use tracing::{error, info, instrument};
use vivero_core::{CollectionId, DeviceFingerprint, ProductId, UserId};

use crate::backend::{CatalogBackend, FavoritesBackend};
use crate::db::RepositoryError;
use crate::models::{FavoriteCollection, Owner};

/// Name given to the collection created on an owner's first favorite.
pub const DEFAULT_COLLECTION_NAME: &str = "Favoritos";

/// Maximum collection name length, in characters.
pub const MAX_COLLECTION_NAME_LENGTH: usize = 60;

/// Errors from favorites operations.
#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("invalid collection name: {0}")]
    InvalidName(&'static str),

    #[error("collection {0} not found")]
    CollectionNotFound(CollectionId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("favorites storage failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl FavoritesError {
    /// Message safe to show on the favorites page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidName(_) => {
                "El nombre de la colección debe tener entre 1 y 60 caracteres.".to_owned()
            }
            Self::CollectionNotFound(_) => "No encontramos esa colección.".to_owned(),
            Self::ProductNotFound(_) => "Ese producto ya no está disponible.".to_owned(),
            Self::Repository(_) => "No se pudieron guardar tus favoritos.".to_owned(),
        }
    }
}

/// Result of toggling a product in the active collection.
#[derive(Debug, Clone)]
pub struct Toggled {
    pub collections: Vec<FavoriteCollection>,
    /// Collection the product was toggled in (created if the owner had none).
    pub collection_id: CollectionId,
    /// `true` if the product was added, `false` if removed.
    pub added: bool,
}

/// What a favorites merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FavoritesMergeOutcome {
    /// Anonymous collections folded into a same-named user collection.
    pub merged: usize,
    /// Anonymous collections handed over to the user unchanged.
    pub transferred: usize,
}

/// Trim and validate a collection name.
///
/// # Errors
///
/// Returns `FavoritesError::InvalidName` if the trimmed name is empty or too long.
pub fn normalize_name(name: &str) -> Result<String, FavoritesError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FavoritesError::InvalidName("name is required"));
    }
    if name.chars().count() > MAX_COLLECTION_NAME_LENGTH {
        return Err(FavoritesError::InvalidName("name must be at most 60 characters"));
    }
    Ok(name.to_owned())
}

pub struct FavoritesService<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B> FavoritesService<'a, B>
where
    B: FavoritesBackend + CatalogBackend + ?Sized,
{
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// The owner's collections in creation order.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::Repository` if the backend fails.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn list(&self, owner: &Owner) -> Result<Vec<FavoriteCollection>, FavoritesError> {
        Ok(self
            .backend
            .list_collections(owner)
            .await
            .map_err(log_failure)?)
    }

    /// Create a collection.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::InvalidName` for an empty or overlong name.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn create(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<FavoriteCollection, FavoritesError> {
        let name = normalize_name(name)?;
        Ok(self
            .backend
            .create_collection(owner, &name)
            .await
            .map_err(log_failure)?)
    }

    /// Rename one of the owner's collections.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::CollectionNotFound` if the owner has no such collection.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn rename(
        &self,
        owner: &Owner,
        id: CollectionId,
        name: &str,
    ) -> Result<Vec<FavoriteCollection>, FavoritesError> {
        let name = normalize_name(name)?;
        self.owned(owner, id).await?;
        self.backend
            .rename_collection(id, &name)
            .await
            .map_err(log_failure)?;
        self.list(owner).await
    }

    /// Delete one of the owner's collections and its items.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::CollectionNotFound` if the owner has no such collection.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn delete(
        &self,
        owner: &Owner,
        id: CollectionId,
    ) -> Result<Vec<FavoriteCollection>, FavoritesError> {
        self.owned(owner, id).await?;
        self.backend
            .delete_collection(id)
            .await
            .map_err(log_failure)?;
        self.list(owner).await
    }

    /// Put a product into a collection. Adding a product twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::CollectionNotFound` or
    /// `FavoritesError::ProductNotFound` for unknown ids.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn add_item(
        &self,
        owner: &Owner,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<Vec<FavoriteCollection>, FavoritesError> {
        let collection = self.owned(owner, collection_id).await?;
        self.ensure_product(product_id).await?;

        if !collection.contains(product_id) {
            match self
                .backend
                .insert_favorite_item(collection_id, product_id)
                .await
            {
                Ok(_) | Err(RepositoryError::Conflict(_)) => {}
                Err(e) => return Err(log_failure(e).into()),
            }
        }
        self.list(owner).await
    }

    /// Take a product out of a collection.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::CollectionNotFound` if the owner has no such collection.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn remove_item(
        &self,
        owner: &Owner,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<Vec<FavoriteCollection>, FavoritesError> {
        self.owned(owner, collection_id).await?;
        self.backend
            .delete_favorite_item(collection_id, product_id)
            .await
            .map_err(log_failure)?;
        self.list(owner).await
    }

    /// Add or remove a product in the active collection.
    ///
    /// Falls back to the owner's first collection when `active` is unset or
    /// not theirs, and creates [`DEFAULT_COLLECTION_NAME`] when they have none.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::ProductNotFound` for an unknown product.
    #[instrument(skip(self), fields(owner = %owner.describe()))]
    pub async fn toggle(
        &self,
        owner: &Owner,
        active: Option<CollectionId>,
        product_id: ProductId,
    ) -> Result<Toggled, FavoritesError> {
        self.ensure_product(product_id).await?;

        let collections = self.list(owner).await?;
        let target = active
            .and_then(|id| collections.iter().find(|c| c.id == id))
            .or_else(|| collections.first())
            .cloned();

        let target = match target {
            Some(collection) => collection,
            None => self
                .backend
                .create_collection(owner, DEFAULT_COLLECTION_NAME)
                .await
                .map_err(log_failure)?,
        };

        let added = if target.contains(product_id) {
            self.backend
                .delete_favorite_item(target.id, product_id)
                .await
                .map_err(log_failure)?;
            false
        } else {
            self.backend
                .insert_favorite_item(target.id, product_id)
                .await
                .map_err(log_failure)?;
            true
        };

        Ok(Toggled {
            collections: self.list(owner).await?,
            collection_id: target.id,
            added,
        })
    }

    /// Hand the anonymous collections of `device` over to `user_id`.
    ///
    /// A collection whose name matches one of the user's is merged into it
    /// (products already there are skipped) and then deleted; any other
    /// collection is reassigned to the user as is.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError::Repository` if any backend call fails.
    #[instrument(skip(self), fields(user_id = %user_id, device = %device))]
    pub async fn migrate_favorites(
        &self,
        user_id: UserId,
        device: &DeviceFingerprint,
    ) -> Result<FavoritesMergeOutcome, FavoritesError> {
        let anonymous = self.list(&Owner::Device(device.clone())).await?;
        if anonymous.is_empty() {
            return Ok(FavoritesMergeOutcome::default());
        }

        let user = Owner::User(user_id);
        let existing = self.list(&user).await?;
        let mut outcome = FavoritesMergeOutcome::default();

        for collection in anonymous {
            match existing.iter().find(|c| c.name == collection.name) {
                Some(target) => {
                    for item in &collection.items {
                        if target.contains(item.product_id) {
                            continue;
                        }
                        match self
                            .backend
                            .insert_favorite_item(target.id, item.product_id)
                            .await
                        {
                            Ok(_) | Err(RepositoryError::Conflict(_)) => {}
                            Err(e) => return Err(log_failure(e).into()),
                        }
                    }
                    self.backend
                        .delete_collection(collection.id)
                        .await
                        .map_err(log_failure)?;
                    outcome.merged += 1;
                }
                None => {
                    self.backend
                        .transfer_collection(collection.id, &user)
                        .await
                        .map_err(log_failure)?;
                    outcome.transferred += 1;
                }
            }
        }

        info!(
            merged = outcome.merged,
            transferred = outcome.transferred,
            "Merged anonymous favorites"
        );
        Ok(outcome)
    }

    async fn owned(
        &self,
        owner: &Owner,
        id: CollectionId,
    ) -> Result<FavoriteCollection, FavoritesError> {
        self.backend
            .get_collection(id)
            .await
            .map_err(log_failure)?
            .filter(|c| &c.owner == owner)
            .ok_or(FavoritesError::CollectionNotFound(id))
    }

    async fn ensure_product(&self, product_id: ProductId) -> Result<(), FavoritesError> {
        self.backend
            .get_product(product_id)
            .await
            .map_err(log_failure)?
            .map(|_| ())
            .ok_or(FavoritesError::ProductNotFound(product_id))
    }
}

fn log_failure(err: RepositoryError) -> RepositoryError {
    error!(error = %err, "Favorites backend call failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;

    fn device() -> DeviceFingerprint {
        DeviceFingerprint::parse("device-abc-123").unwrap()
    }

    fn anon() -> Owner {
        Owner::Device(device())
    }

    fn product_ids(collection: &FavoriteCollection) -> Vec<ProductId> {
        collection.items.iter().map(|i| i.product_id).collect()
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Interior  ").unwrap(), "Interior");
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name(&"a".repeat(61)).is_err());
        assert!(normalize_name(&"ñ".repeat(60)).is_ok());
    }

    #[tokio::test]
    async fn test_toggle_creates_default_collection() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);

        let toggled = service.toggle(&anon(), None, ProductId::new(1)).await.unwrap();
        assert!(toggled.added);
        assert_eq!(toggled.collections.len(), 1);
        assert_eq!(toggled.collections[0].name, DEFAULT_COLLECTION_NAME);
        assert_eq!(product_ids(&toggled.collections[0]), [ProductId::new(1)]);

        let toggled = service
            .toggle(&anon(), Some(toggled.collection_id), ProductId::new(1))
            .await
            .unwrap();
        assert!(!toggled.added);
        assert!(toggled.collections[0].items.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_uses_active_collection() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);

        service.create(&anon(), "Interior").await.unwrap();
        let patio = service.create(&anon(), "Patio").await.unwrap();

        let toggled = service
            .toggle(&anon(), Some(patio.id), ProductId::new(3))
            .await
            .unwrap();
        assert_eq!(toggled.collection_id, patio.id);
    }

    #[tokio::test]
    async fn test_collections_of_other_owners_are_hidden() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);
        let collection = service.create(&anon(), "Interior").await.unwrap();
        let stranger = Owner::User(UserId::new(42));

        assert!(matches!(
            service.rename(&stranger, collection.id, "Mine").await,
            Err(FavoritesError::CollectionNotFound(_))
        ));
        assert!(matches!(
            service.delete(&stranger, collection.id).await,
            Err(FavoritesError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_item_twice_is_noop() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);
        let collection = service.create(&anon(), "Interior").await.unwrap();

        service
            .add_item(&anon(), collection.id, ProductId::new(1))
            .await
            .unwrap();
        let collections = service
            .add_item(&anon(), collection.id, ProductId::new(1))
            .await
            .unwrap();
        assert_eq!(product_ids(&collections[0]), [ProductId::new(1)]);

        let collections = service
            .remove_item(&anon(), collection.id, ProductId::new(1))
            .await
            .unwrap();
        assert!(collections[0].items.is_empty());
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);
        let collection = service.create(&anon(), "Interior").await.unwrap();

        let collections = service
            .rename(&anon(), collection.id, " Sala ")
            .await
            .unwrap();
        assert_eq!(collections[0].name, "Sala");

        let collections = service.delete(&anon(), collection.id).await.unwrap();
        assert!(collections.is_empty());
    }

    #[tokio::test]
    async fn test_migrate_merges_same_name_and_transfers_others() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);
        let user = Owner::User(UserId::new(7));

        let mine = service.create(&user, "Favoritos").await.unwrap();
        service.add_item(&user, mine.id, ProductId::new(1)).await.unwrap();

        let anon_favs = service.create(&anon(), "Favoritos").await.unwrap();
        service
            .add_item(&anon(), anon_favs.id, ProductId::new(1))
            .await
            .unwrap();
        service
            .add_item(&anon(), anon_favs.id, ProductId::new(3))
            .await
            .unwrap();
        service.create(&anon(), "Patio").await.unwrap();

        let outcome = service
            .migrate_favorites(UserId::new(7), &device())
            .await
            .unwrap();
        assert_eq!(outcome, FavoritesMergeOutcome { merged: 1, transferred: 1 });

        let collections = service.list(&user).await.unwrap();
        let names: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Favoritos", "Patio"]);
        assert_eq!(
            product_ids(&collections[0]),
            [ProductId::new(1), ProductId::new(3)]
        );
        assert!(service.list(&anon()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_without_anonymous_collections_is_noop() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);

        let outcome = service
            .migrate_favorites(UserId::new(7), &device())
            .await
            .unwrap();
        assert_eq!(outcome, FavoritesMergeOutcome::default());
    }

    #[tokio::test]
    async fn test_backend_failure_is_reported() {
        let backend = FakeBackend::seeded();
        let service = FavoritesService::new(&backend);

        backend.fail("insert_favorite_item").await;
        assert!(matches!(
            service.toggle(&anon(), None, ProductId::new(1)).await,
            Err(FavoritesError::Repository(_))
        ));

        backend.fail("list_collections").await;
        assert!(matches!(
            service.list(&anon()).await,
            Err(FavoritesError::Repository(_))
        ));
    }
}
