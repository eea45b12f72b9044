//! Per-session client state.
//!
//! The [`Store`] holds three slices (auth, cart, products) that change only
//! through their `reduce` functions. Route handlers load the store from the
//! session, run a thunk from [`thunks`], dispatch the returned action and
//! write the store back before rendering.
//!
//! Data that is cheap to refetch (product lists, cart lines, collections) is
//! skipped during serialization; only identity, counters, UI choices and the
//! last error survive between requests.

pub mod auth;
pub mod cart;
pub mod products;
pub mod thunks;

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use crate::models::session_keys;

pub use auth::{AuthAction, AuthState};
pub use cart::{CartAction, CartState};
pub use products::{ProductsAction, ProductsState};

/// Lifecycle of the last async request in a slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Any slice action.
#[derive(Debug, Clone)]
pub enum Action {
    Auth(AuthAction),
    Cart(CartAction),
    Products(ProductsAction),
}

impl From<AuthAction> for Action {
    fn from(action: AuthAction) -> Self {
        Self::Auth(action)
    }
}

impl From<CartAction> for Action {
    fn from(action: CartAction) -> Self {
        Self::Cart(action)
    }
}

impl From<ProductsAction> for Action {
    fn from(action: ProductsAction) -> Self {
        Self::Products(action)
    }
}

/// The combined client state of one browser session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    pub auth: AuthState,
    pub cart: CartState,
    pub products: ProductsState,
}

impl Store {
    /// Read the store from the session, starting fresh if absent or unreadable.
    pub async fn load(session: &Session) -> Self {
        match session.get::<Self>(session_keys::STORE).await {
            Ok(Some(store)) => store,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session store");
                Self::default()
            }
        }
    }

    /// Write the store back, keeping the session's signed-in user in step
    /// with the auth slice.
    ///
    /// # Errors
    ///
    /// Returns the session error if the store cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        match &self.auth.user {
            Some(user) => session.insert(session_keys::CURRENT_USER, user).await?,
            None => {
                session
                    .remove::<serde_json::Value>(session_keys::CURRENT_USER)
                    .await?;
            }
        }
        session.insert(session_keys::STORE, self).await
    }

    /// Take the pending cart error, else the pending catalog/favorites error.
    ///
    /// Page handlers call this before dispatching, since `Pending` clears
    /// errors left by the form post that redirected here.
    pub fn take_flash(&mut self) -> Option<String> {
        self.cart
            .take_error()
            .or_else(|| self.products.take_error())
    }

    /// Apply an action to the slice it belongs to.
    pub fn dispatch(&mut self, action: impl Into<Action>) {
        match action.into() {
            Action::Auth(action) => self.auth.reduce(action),
            Action::Cart(action) => self.cart.reduce(action),
            Action::Products(action) => self.products.reduce(action),
        }
    }
}
