//! Cart and cart item queries.

use async_trait::async_trait;
use sqlx::FromRow;
use vivero_core::{CartId, CartItemId, ProductId};

use super::catalog::{PRODUCT_COLUMNS, ProductRow};
use super::{
    PgBackend, RepositoryError, non_negative, owner_columns, owner_from_columns, quantity_column,
};
use crate::backend::CartBackend;
use crate::models::{Cart, CartItem, Owner, Product};

#[derive(FromRow)]
struct CartRow {
    id: CartId,
    user_id: Option<i32>,
    device_fingerprint: Option<String>,
}

impl TryFrom<CartRow> for Cart {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: owner_from_columns(row.user_id, row.device_fingerprint)?,
        })
    }
}

#[derive(FromRow)]
struct CartItemRow {
    item_id: CartItemId,
    item_cart_id: CartId,
    item_quantity: i32,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let product = Product::try_from(row.product)?;
        Ok(Self {
            id: row.item_id,
            cart_id: row.item_cart_id,
            product_id: product.id,
            quantity: non_negative(row.item_quantity, "quantity")?,
            product: Some(product),
        })
    }
}

fn item_select(condition: &str) -> String {
    format!(
        "SELECT ci.id AS item_id, ci.cart_id AS item_cart_id, ci.quantity AS item_quantity,
                {PRODUCT_COLUMNS}
         FROM storefront.cart_items ci
         JOIN storefront.products p ON p.id = ci.product_id
         JOIN storefront.categories c ON c.id = p.category_id
         WHERE {condition}
         ORDER BY ci.id"
    )
}

#[async_trait]
impl CartBackend for PgBackend {
    async fn find_cart(&self, owner: &Owner) -> Result<Option<Cart>, RepositoryError> {
        let (user_id, device) = owner_columns(owner);
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, device_fingerprint
             FROM storefront.carts
             WHERE user_id = $1 OR device_fingerprint = $2",
        )
        .bind(user_id)
        .bind(device)
        .fetch_optional(self.pool())
        .await?;

        row.map(Cart::try_from).transpose()
    }

    async fn create_cart(&self, owner: &Owner) -> Result<Cart, RepositoryError> {
        let (user_id, device) = owner_columns(owner);
        let row = sqlx::query_as::<_, CartRow>(
            "INSERT INTO storefront.carts (user_id, device_fingerprint)
             VALUES ($1, $2)
             RETURNING id, user_id, device_fingerprint",
        )
        .bind(user_id)
        .bind(device)
        .fetch_one(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "cart"))?;

        Cart::try_from(row)
    }

    async fn delete_cart(&self, id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.carts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&item_select("ci.cart_id = $1"))
            .bind(cart_id)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(CartItem::try_from).collect()
    }

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&item_select(
            "ci.cart_id = $1 AND ci.product_id = $2",
        ))
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&item_select("ci.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.map(CartItem::try_from).transpose()
    }

    async fn insert_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError> {
        let id: CartItemId = sqlx::query_scalar(
            "INSERT INTO storefront.cart_items (cart_id, product_id, quantity)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity_column(quantity)?)
        .fetch_one(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "cart item"))?;

        self.get_cart_item(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE storefront.cart_items SET quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(quantity_column(quantity)?)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_items WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
