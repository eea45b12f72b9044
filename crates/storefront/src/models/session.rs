//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use vivero_core::{Email, UserId};

use super::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name, if the shopper set one.
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Name to greet the shopper with.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.email.local_part())
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the serialized client state (`crate::store::Store`).
    pub const STORE: &str = "store";

    /// Key for OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the post-login redirect carried through the OAuth round trip.
    pub const OAUTH_REDIRECT: &str = "oauth_redirect";
}
