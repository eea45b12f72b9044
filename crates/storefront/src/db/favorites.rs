//! Favorite collection and item queries.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::FromRow;
use vivero_core::{CollectionId, FavoriteItemId, ProductId};

use super::catalog::{PRODUCT_COLUMNS, ProductRow};
use super::{PgBackend, RepositoryError, owner_columns, owner_from_columns};
use crate::backend::FavoritesBackend;
use crate::models::{FavoriteCollection, FavoriteItem, Owner, Product};

#[derive(FromRow)]
struct CollectionRow {
    id: CollectionId,
    name: String,
    user_id: Option<i32>,
    device_fingerprint: Option<String>,
}

impl CollectionRow {
    fn into_collection(self, items: Vec<FavoriteItem>) -> Result<FavoriteCollection, RepositoryError> {
        Ok(FavoriteCollection {
            id: self.id,
            name: self.name,
            owner: owner_from_columns(self.user_id, self.device_fingerprint)?,
            items,
        })
    }
}

#[derive(FromRow)]
struct FavoriteItemRow {
    item_id: FavoriteItemId,
    item_collection_id: CollectionId,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<FavoriteItemRow> for FavoriteItem {
    type Error = RepositoryError;

    fn try_from(row: FavoriteItemRow) -> Result<Self, Self::Error> {
        let product = Product::try_from(row.product)?;
        Ok(Self {
            id: row.item_id,
            collection_id: row.item_collection_id,
            product_id: product.id,
            product: Some(product),
        })
    }
}

impl PgBackend {
    /// Items for a set of collections, grouped by collection.
    async fn items_for(
        &self,
        collection_ids: &[i32],
    ) -> Result<HashMap<CollectionId, Vec<FavoriteItem>>, RepositoryError> {
        let sql = format!(
            "SELECT fi.id AS item_id, fi.collection_id AS item_collection_id, {PRODUCT_COLUMNS}
             FROM storefront.favorite_items fi
             JOIN storefront.products p ON p.id = fi.product_id
             JOIN storefront.categories c ON c.id = p.category_id
             WHERE fi.collection_id = ANY($1)
             ORDER BY fi.id"
        );

        let rows = sqlx::query_as::<_, FavoriteItemRow>(&sql)
            .bind(collection_ids)
            .fetch_all(self.pool())
            .await?;

        let mut grouped: HashMap<CollectionId, Vec<FavoriteItem>> = HashMap::new();
        for row in rows {
            let item = FavoriteItem::try_from(row)?;
            grouped.entry(item.collection_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl FavoritesBackend for PgBackend {
    async fn list_collections(
        &self,
        owner: &Owner,
    ) -> Result<Vec<FavoriteCollection>, RepositoryError> {
        let (user_id, device) = owner_columns(owner);
        let rows = sqlx::query_as::<_, CollectionRow>(
            "SELECT id, name, user_id, device_fingerprint
             FROM storefront.favorite_collections
             WHERE user_id = $1 OR device_fingerprint = $2
             ORDER BY created_at, id",
        )
        .bind(user_id)
        .bind(device)
        .fetch_all(self.pool())
        .await?;

        let ids: Vec<i32> = rows.iter().map(|row| row.id.as_i32()).collect();
        let mut items = self.items_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let collection_items = items.remove(&row.id).unwrap_or_default();
                row.into_collection(collection_items)
            })
            .collect()
    }

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<FavoriteCollection>, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            "SELECT id, name, user_id, device_fingerprint
             FROM storefront.favorite_collections
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = self.items_for(&[id.as_i32()]).await?;
        let collection_items = items.remove(&id).unwrap_or_default();
        row.into_collection(collection_items).map(Some)
    }

    async fn create_collection(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<FavoriteCollection, RepositoryError> {
        let (user_id, device) = owner_columns(owner);
        let row = sqlx::query_as::<_, CollectionRow>(
            "INSERT INTO storefront.favorite_collections (name, user_id, device_fingerprint)
             VALUES ($1, $2, $3)
             RETURNING id, name, user_id, device_fingerprint",
        )
        .bind(name)
        .bind(user_id)
        .bind(device)
        .fetch_one(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "collection"))?;

        row.into_collection(Vec::new())
    }

    async fn rename_collection(
        &self,
        id: CollectionId,
        name: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE storefront.favorite_collections SET name = $2 WHERE id = $1")
                .bind(id)
                .bind(name)
                .execute(self.pool())
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.favorite_collections WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transfer_collection(
        &self,
        id: CollectionId,
        owner: &Owner,
    ) -> Result<(), RepositoryError> {
        let (user_id, device) = owner_columns(owner);
        let result = sqlx::query(
            "UPDATE storefront.favorite_collections
             SET user_id = $2, device_fingerprint = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(user_id)
        .bind(device)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn insert_favorite_item(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<FavoriteItem, RepositoryError> {
        let id: FavoriteItemId = sqlx::query_scalar(
            "INSERT INTO storefront.favorite_items (collection_id, product_id)
             VALUES ($1, $2)
             RETURNING id",
        )
        .bind(collection_id)
        .bind(product_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| RepositoryError::from_insert(e, "favorite"))?;

        let sql = format!(
            "SELECT fi.id AS item_id, fi.collection_id AS item_collection_id, {PRODUCT_COLUMNS}
             FROM storefront.favorite_items fi
             JOIN storefront.products p ON p.id = fi.product_id
             JOIN storefront.categories c ON c.id = p.category_id
             WHERE fi.id = $1"
        );
        let row = sqlx::query_as::<_, FavoriteItemRow>(&sql)
            .bind(id)
            .fetch_one(self.pool())
            .await?;

        FavoriteItem::try_from(row)
    }

    async fn delete_favorite_item(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.favorite_items WHERE collection_id = $1 AND product_id = $2",
        )
        .bind(collection_id)
        .bind(product_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
