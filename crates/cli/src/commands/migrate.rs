//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! vivero-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded at
//! compile time.

use tracing::info;
use vivero_storefront::db;

use super::database_url;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url()?;

    info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Storefront migrations complete!");
    Ok(())
}
