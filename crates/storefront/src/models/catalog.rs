//! Catalog domain types.

use rust_decimal::Decimal;
use vivero_core::{CategoryId, CategoryKind, CurrencyCode, Price, ProductId};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub kind: CategoryKind,
}

/// A product for sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in the storefront currency.
    pub price: Decimal,
    /// Units on hand. Zero means sold out.
    pub stock: u32,
    pub category_id: CategoryId,
    /// Joined category, when the query selected it.
    pub category: Option<Category>,
    pub image_url: Option<String>,
}

impl Product {
    /// Whether the product can be added to a cart at all.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Unit price in `currency`.
    #[must_use]
    pub const fn unit_price(&self, currency: CurrencyCode) -> Price {
        Price::new(self.price, currency)
    }
}

/// Product listing filter.
///
/// All fields are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    pub kind: Option<CategoryKind>,
    /// Case-insensitive substring match on the product name.
    pub search: Option<String>,
}

impl ProductFilter {
    /// Whether no criteria are set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.kind.is_none() && self.search.is_none()
    }

    /// In-memory form of the filter, matching the SQL in `db::catalog`.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if self.category_id.is_some_and(|id| id != product.category_id) {
            return false;
        }
        if let Some(kind) = self.kind
            && product.category.as_ref().is_none_or(|c| c.kind != kind)
        {
            return false;
        }
        if let Some(search) = &self.search
            && !product.name.to_lowercase().contains(&search.to_lowercase())
        {
            return false;
        }
        true
    }
}
