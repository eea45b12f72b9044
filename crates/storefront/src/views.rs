//! Display data for templates.
//!
//! Templates only read precomputed fields; flags such as
//! `increment_disabled` are decided here so the rules are testable
//! without rendering.

use std::collections::HashSet;

use rust_decimal::Decimal;
use vivero_core::{
    CartItemId, CategoryId, CategoryKind, CollectionId, CurrencyCode, Price, ProductId,
};

use crate::models::{CartItem, Category, FavoriteCollection, Product};
use crate::store::Store;

/// Stock at or below which the card warns that few units remain.
const LOW_STOCK_THRESHOLD: u32 = 5;

/// Header data shared by every full page.
#[derive(Debug, Clone, Default)]
pub struct LayoutView {
    pub user_name: Option<String>,
    pub cart_count: u32,
    /// One-time message from the last failed cart or favorites action.
    pub flash: Option<String>,
}

impl LayoutView {
    /// Build the header from the store.
    ///
    /// `flash` is an error taken before this request dispatched anything;
    /// without one, an error raised while serving this request is shown.
    #[must_use]
    pub fn from_store(store: &mut Store, flash: Option<String>) -> Self {
        Self {
            user_name: store
                .auth
                .user
                .as_ref()
                .map(|u| u.greeting_name().to_owned()),
            cart_count: store.cart.item_count,
            flash: flash.or_else(|| store.take_flash()),
        }
    }
}

/// Product card / detail display data.
#[derive(Debug, Clone)]
pub struct ProductCardView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    pub category_name: Option<String>,
    pub stock: u32,
    pub out_of_stock: bool,
    pub stock_label: String,
    pub favorited: bool,
}

impl ProductCardView {
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode, favorites: &HashSet<ProductId>) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: product.unit_price(currency).display(),
            image_url: product.image_url.clone(),
            category_name: product.category.as_ref().map(|c| c.name.clone()),
            stock: product.stock,
            out_of_stock: !product.in_stock(),
            stock_label: stock_label(product.stock),
            favorited: favorites.contains(&product.id),
        }
    }

    /// Cards for a listing.
    #[must_use]
    pub fn list(
        products: &[Product],
        currency: CurrencyCode,
        favorites: &HashSet<ProductId>,
    ) -> Vec<Self> {
        products
            .iter()
            .map(|p| Self::new(p, currency, favorites))
            .collect()
    }
}

/// Availability text shown on product cards.
#[must_use]
pub fn stock_label(stock: u32) -> String {
    match stock {
        0 => "Agotado".to_owned(),
        1 => "¡Solo queda 1!".to_owned(),
        n if n <= LOW_STOCK_THRESHOLD => format!("¡Solo quedan {n}!"),
        _ => "En stock".to_owned(),
    }
}

/// Category filter link.
#[derive(Debug, Clone)]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub kind_label: String,
    pub selected: bool,
}

impl CategoryView {
    #[must_use]
    pub fn list(categories: &[Category], selected: Option<CategoryId>) -> Vec<Self> {
        categories
            .iter()
            .map(|c| Self {
                id: c.id,
                name: c.name.clone(),
                kind_label: c.kind.label().to_owned(),
                selected: selected == Some(c.id),
            })
            .collect()
    }
}

/// Category-kind filter link.
#[derive(Debug, Clone)]
pub struct KindView {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl KindView {
    #[must_use]
    pub fn all(selected: Option<CategoryKind>) -> Vec<Self> {
        CategoryKind::ALL
            .iter()
            .map(|kind| Self {
                value: kind.as_str(),
                label: kind.label(),
                selected: selected == Some(*kind),
            })
            .collect()
    }
}

/// Cart line display data.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub stock: u32,
    pub unit_price: String,
    pub line_price: String,
    pub decrement_disabled: bool,
    pub increment_disabled: bool,
}

impl CartItemView {
    #[must_use]
    pub fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        let (name, image_url, price, stock) = item.product.as_ref().map_or_else(
            || (String::new(), None, Decimal::ZERO, 0),
            |p| (p.name.clone(), p.image_url.clone(), p.price, p.stock),
        );
        let unit = Price::new(price, currency);

        Self {
            id: item.id,
            product_id: item.product_id,
            name,
            image_url,
            quantity: item.quantity,
            stock,
            unit_price: unit.display(),
            line_price: unit.times(item.quantity).display(),
            decrement_disabled: item.quantity <= 1,
            increment_disabled: item.quantity >= stock,
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    #[must_use]
    pub fn new(items: &[CartItem], currency: CurrencyCode) -> Self {
        Self {
            items: items.iter().map(|i| CartItemView::new(i, currency)).collect(),
            subtotal: subtotal(items, currency).display(),
            item_count: items.iter().map(|i| i.quantity).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sum of line prices.
#[must_use]
pub fn subtotal(items: &[CartItem], currency: CurrencyCode) -> Price {
    let amount = items
        .iter()
        .filter_map(|i| i.product.as_ref().map(|p| p.price * Decimal::from(i.quantity)))
        .sum();
    Price::new(amount, currency)
}

/// Favorite collection display data.
#[derive(Debug, Clone)]
pub struct CollectionView {
    pub id: CollectionId,
    pub name: String,
    pub active: bool,
    pub products: Vec<ProductCardView>,
}

impl CollectionView {
    #[must_use]
    pub fn list(
        collections: &[FavoriteCollection],
        active: Option<CollectionId>,
        currency: CurrencyCode,
    ) -> Vec<Self> {
        let active = active
            .filter(|id| collections.iter().any(|c| c.id == *id))
            .or_else(|| collections.first().map(|c| c.id));

        collections
            .iter()
            .map(|c| {
                let ids: HashSet<ProductId> = c.items.iter().map(|i| i.product_id).collect();
                Self {
                    id: c.id,
                    name: c.name.clone(),
                    active: active == Some(c.id),
                    products: c
                        .items
                        .iter()
                        .filter_map(|i| i.product.as_ref())
                        .map(|p| ProductCardView::new(p, currency, &ids))
                        .collect(),
                }
            })
            .collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.products.len()
    }
}

/// Every product id saved in any of the collections.
#[must_use]
pub fn favorite_ids(collections: &[FavoriteCollection]) -> HashSet<ProductId> {
    collections
        .iter()
        .flat_map(|c| c.items.iter().map(|i| i.product_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use vivero_core::{CartId, FavoriteItemId};

    use super::*;
    use crate::models::{FavoriteItem, Owner};

    fn product(id: i32, price_cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Planta {id}"),
            description: None,
            price: Decimal::new(price_cents, 2),
            stock,
            category_id: CategoryId::new(1),
            category: Some(Category {
                id: CategoryId::new(1),
                name: "Plantas".to_owned(),
                kind: CategoryKind::Plant,
            }),
            image_url: None,
        }
    }

    fn line(id: i32, product: Product, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            cart_id: CartId::new(1),
            product_id: product.id,
            quantity,
            product: Some(product),
        }
    }

    #[test]
    fn test_sold_out_card() {
        let card = ProductCardView::new(&product(1, 1000, 0), CurrencyCode::USD, &HashSet::new());
        assert!(card.out_of_stock);
        assert_eq!(card.stock_label, "Agotado");
        assert!(!card.favorited);
    }

    #[test]
    fn test_stock_labels() {
        assert_eq!(stock_label(1), "¡Solo queda 1!");
        assert_eq!(stock_label(3), "¡Solo quedan 3!");
        assert_eq!(stock_label(20), "En stock");
    }

    #[test]
    fn test_kind_links_mark_selection() {
        let kinds = KindView::all(Some(CategoryKind::Kit));
        assert_eq!(kinds.len(), 3);
        assert!(kinds.iter().any(|k| k.value == "kit" && k.selected));
        assert_eq!(kinds.iter().filter(|k| k.selected).count(), 1);
    }

    #[test]
    fn test_cart_item_button_flags() {
        let at_one = CartItemView::new(&line(1, product(1, 1000, 5), 1), CurrencyCode::USD);
        assert!(at_one.decrement_disabled);
        assert!(!at_one.increment_disabled);

        let at_stock = CartItemView::new(&line(2, product(2, 1000, 3), 3), CurrencyCode::USD);
        assert!(!at_stock.decrement_disabled);
        assert!(at_stock.increment_disabled);
    }

    #[test]
    fn test_cart_totals() {
        let items = [
            line(1, product(1, 1250, 5), 2),
            line(2, product(2, 399, 9), 1),
        ];
        let view = CartView::new(&items, CurrencyCode::USD);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "$28.99");
        assert_eq!(view.items[0].line_price, "$25.00");
        assert!(!view.is_empty());
    }

    #[test]
    fn test_collection_view_defaults_active_to_first() {
        let collection = |id: i32, name: &str| FavoriteCollection {
            id: CollectionId::new(id),
            name: name.to_owned(),
            owner: Owner::User(vivero_core::UserId::new(1)),
            items: vec![FavoriteItem {
                id: FavoriteItemId::new(id),
                collection_id: CollectionId::new(id),
                product_id: ProductId::new(id),
                product: Some(product(id, 100, 1)),
            }],
        };
        let collections = [collection(1, "Interior"), collection(2, "Patio")];

        let views = CollectionView::list(&collections, None, CurrencyCode::USD);
        assert!(views[0].active);
        assert!(!views[1].active);
        assert!(views[0].products[0].favorited);

        let views = CollectionView::list(&collections, Some(CollectionId::new(2)), CurrencyCode::USD);
        assert!(views[1].active);

        assert_eq!(favorite_ids(&collections).len(), 2);
    }
}
