//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::backend::Backend;
use crate::config::StorefrontConfig;
use crate::db::PgBackend;
use crate::services::catalog::CatalogCache;
use crate::services::email::EmailService;
use crate::services::oauth::OAuthClient;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend, the catalog cache and the optional integrations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Arc<dyn Backend>,
    catalog_cache: CatalogCache,
    oauth: Option<OAuthClient>,
    mailer: Option<EmailService>,
}

impl AppState {
    /// Create application state backed by `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        Self::with_backend(config, Arc::new(PgBackend::new(pool)))
    }

    /// Create application state over any backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be built.
    pub fn with_backend(
        config: StorefrontConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, StateError> {
        let oauth = config.oauth.as_ref().map(OAuthClient::new);
        let mailer = config.email.as_ref().map(EmailService::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                catalog_cache: CatalogCache::new(),
                oauth,
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The data backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    /// Shared cache for categories and unfiltered product listings.
    #[must_use]
    pub fn catalog_cache(&self) -> &CatalogCache {
        &self.inner.catalog_cache
    }

    /// OAuth client, when a provider is configured.
    #[must_use]
    pub fn oauth(&self) -> Option<&OAuthClient> {
        self.inner.oauth.as_ref()
    }

    /// Mailer, when SMTP is configured.
    #[must_use]
    pub fn mailer(&self) -> Option<&EmailService> {
        self.inner.mailer.as_ref()
    }
}
