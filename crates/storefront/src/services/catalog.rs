//! Catalog service: categories and product listings.
//!
//! Categories and listings without a search term are cached for 60 seconds.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, error, instrument};
use vivero_core::ProductId;

use crate::backend::CatalogBackend;
use crate::db::RepositoryError;
use crate::models::{Category, Product, ProductFilter};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("catalog query failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl CatalogError {
    /// Message safe to show on listing pages.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ProductNotFound(_) => "No encontramos ese producto.".to_owned(),
            Self::Repository(_) => "No se pudo cargar el catálogo.".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Products(ProductFilter),
}

#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Products(Arc<Vec<Product>>),
}

/// Shared TTL cache for read-mostly catalog data.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Cache<CacheKey, CacheValue>,
}

impl CatalogCache {
    /// Create a cache with the storefront's default 60 second TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(60))
    }

    /// Create a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(256).time_to_live(ttl).build(),
        }
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to categories and products.
pub struct CatalogService<'a, B: ?Sized> {
    backend: &'a B,
    cache: &'a CatalogCache,
}

impl<'a, B: CatalogBackend + ?Sized> CatalogService<'a, B> {
    #[must_use]
    pub const fn new(backend: &'a B, cache: &'a CatalogCache) -> Self {
        Self { backend, cache }
    }

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, CatalogError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.inner.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(self.backend.list_categories().await.map_err(|e| {
            error!(error = %e, "Failed to load categories");
            e
        })?);

        self.cache
            .inner
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Products matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    #[instrument(skip(self))]
    pub async fn products(&self, filter: &ProductFilter) -> Result<Arc<Vec<Product>>, CatalogError> {
        let cacheable = filter.search.is_none();
        let key = CacheKey::Products(filter.clone());

        if cacheable && let Some(CacheValue::Products(products)) = self.cache.inner.get(&key).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products = Arc::new(self.backend.list_products(filter).await.map_err(|e| {
            error!(error = %e, "Failed to load products");
            e
        })?);

        if cacheable {
            self.cache
                .inner
                .insert(key, CacheValue::Products(Arc::clone(&products)))
                .await;
        }
        Ok(products)
    }

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ProductNotFound` if there is no such product.
    #[instrument(skip(self))]
    pub async fn product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.backend
            .get_product(id)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load product");
                e
            })?
            .ok_or(CatalogError::ProductNotFound(id))
    }
}
