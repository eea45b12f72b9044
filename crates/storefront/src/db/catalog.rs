//! Catalog queries: categories and products.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::FromRow;
use vivero_core::{CategoryId, CategoryKind, ProductId};

use super::{PgBackend, RepositoryError, non_negative};
use crate::backend::CatalogBackend;
use crate::models::{Category, Product, ProductFilter};

/// Columns selected for a product joined with its category.
///
/// Shared by the cart and favorites queries, which join products in too.
pub(super) const PRODUCT_COLUMNS: &str = "p.id AS product_id, p.name AS product_name, \
     p.description AS product_description, p.price AS product_price, \
     p.stock AS product_stock, p.image_url AS product_image_url, \
     c.id AS category_id, c.name AS category_name, c.kind AS category_kind";

#[derive(FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    kind: CategoryKind,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            kind: row.kind,
        }
    }
}

/// A product row with its category, as selected by [`PRODUCT_COLUMNS`].
#[derive(FromRow)]
pub(super) struct ProductRow {
    product_id: ProductId,
    product_name: String,
    product_description: Option<String>,
    product_price: Decimal,
    product_stock: i32,
    product_image_url: Option<String>,
    category_id: CategoryId,
    category_name: String,
    category_kind: CategoryKind,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.product_id,
            name: row.product_name,
            description: row.product_description,
            price: row.product_price,
            stock: non_negative(row.product_stock, "stock")?,
            category_id: row.category_id,
            category: Some(Category {
                id: row.category_id,
                name: row.category_name,
                kind: row.category_kind,
            }),
            image_url: row.product_image_url,
        })
    }
}

/// Escape `LIKE` wildcards in user input.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl CatalogBackend for PgBackend {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, kind FROM storefront.categories ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM storefront.products p
             JOIN storefront.categories c ON c.id = p.category_id
             WHERE ($1::INTEGER IS NULL OR p.category_id = $1)
               AND ($2::TEXT IS NULL OR c.kind = $2)
               AND ($3::TEXT IS NULL OR LOWER(p.name) LIKE LOWER($3))
             ORDER BY p.name"
        );

        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(filter.category_id)
            .bind(filter.kind)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM storefront.products p
             JOIN storefront.categories c ON c.id = p.category_id
             WHERE p.id = $1"
        );

        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(Product::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_and_escapes() {
        assert_eq!(like_pattern("fern"), "%fern%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
