//! Favorites domain types.

use vivero_core::{CollectionId, FavoriteItemId, ProductId};

use super::{Owner, Product};

/// A named grouping of favorited products.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteCollection {
    pub id: CollectionId,
    pub name: String,
    pub owner: Owner,
    pub items: Vec<FavoriteItem>,
}

impl FavoriteCollection {
    /// Whether `product_id` is already in this collection.
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }
}

/// A product saved to a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteItem {
    pub id: FavoriteItemId,
    pub collection_id: CollectionId,
    pub product_id: ProductId,
    pub product: Option<Product>,
}
