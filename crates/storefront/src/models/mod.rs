//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row
//! types in [`crate::db`].

pub mod cart;
pub mod catalog;
pub mod favorites;
pub mod owner;
pub mod session;
pub mod user;

pub use cart::{Cart, CartItem};
pub use catalog::{Category, Product, ProductFilter};
pub use favorites::{FavoriteCollection, FavoriteItem};
pub use owner::Owner;
pub use session::{CurrentUser, keys as session_keys};
pub use user::{OAuthProfile, User};
