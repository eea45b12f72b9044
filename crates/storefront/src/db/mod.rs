//! Database operations for the storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `categories`, `products` - Catalog
//! - `carts`, `cart_items` - Carts owned by a user or a device fingerprint
//! - `favorite_collections`, `favorite_items` - Favorites, same ownership rule
//! - `users`, `user_passwords`, `password_reset_tokens`, `oauth_identities` - Accounts
//! - `tower_sessions.session` - Tower-sessions storage (created by the store)
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow` row
//! types, then converted into [`crate::models`] types.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p vivero-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod favorites;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::backend::Backend;
use crate::models::Owner;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict`, leaving other errors as `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL` implementation of the [`crate::backend`] traits.
///
/// The trait impls live next to the queries for each table group.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Split an owner into the `(user_id, device_fingerprint)` column pair.
fn owner_columns(owner: &Owner) -> (Option<i32>, Option<&str>) {
    match owner {
        Owner::User(id) => (Some(id.as_i32()), None),
        Owner::Device(fp) => (None, Some(fp.as_str())),
    }
}

/// Rebuild an owner from the `(user_id, device_fingerprint)` column pair.
fn owner_from_columns(
    user_id: Option<i32>,
    device_fingerprint: Option<String>,
) -> Result<Owner, RepositoryError> {
    match (user_id, device_fingerprint) {
        (Some(id), None) => Ok(Owner::User(vivero_core::UserId::new(id))),
        (None, Some(fp)) => vivero_core::DeviceFingerprint::parse(&fp)
            .map(Owner::Device)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid fingerprint: {e}"))),
        _ => Err(RepositoryError::DataCorruption(
            "row must have exactly one of user_id / device_fingerprint".to_owned(),
        )),
    }
}

/// Convert a non-negative integer column into `u32`.
fn non_negative(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a quantity into its integer column value.
fn quantity_column(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} out of range")))
}
