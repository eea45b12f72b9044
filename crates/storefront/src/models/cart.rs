//! Cart domain types.

use vivero_core::{CartId, CartItemId, ProductId};

use super::{Owner, Product};

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    pub owner: Owner,
}

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Joined product, when the query selected it.
    pub product: Option<Product>,
}
