//! User domain types.

use chrono::{DateTime, Utc};

use vivero_core::{Email, UserId};

/// A storefront shopper account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Name shown in the header and profile.
    pub display_name: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// Identity returned by an external sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    /// Provider label (e.g., "Google").
    pub provider: String,
    /// Stable subject identifier at the provider.
    pub subject: String,
    pub email: Email,
    pub name: Option<String>,
}
