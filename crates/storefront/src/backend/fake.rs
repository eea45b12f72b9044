//! In-memory backend for service and route tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use vivero_core::{
    CartId, CartItemId, CategoryId, CategoryKind, CollectionId, Email, FavoriteItemId, ProductId,
    UserId,
};

use super::{AccountBackend, Backend, CartBackend, CatalogBackend, FavoritesBackend};
use crate::db::RepositoryError;
use crate::models::{
    Cart, CartItem, Category, FavoriteCollection, FavoriteItem, Owner, Product, ProductFilter,
    User,
};

#[derive(Default)]
pub struct FakeState {
    next_id: i32,
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub carts: Vec<Cart>,
    pub cart_items: Vec<CartItem>,
    pub collections: Vec<FavoriteCollection>,
    pub users: Vec<User>,
    pub passwords: HashMap<UserId, String>,
    pub reset_tokens: Vec<(UserId, String, DateTime<Utc>, bool)>,
    pub oauth: HashMap<(String, String), UserId>,
}

impl FakeState {
    const fn next(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        self.products.iter().find(|p| p.id == id).cloned()
    }

    fn joined_item(&self, item: &CartItem) -> CartItem {
        CartItem {
            product: self.product(item.product_id),
            ..item.clone()
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
    /// Operations that return a database error when called.
    pub failing: Mutex<HashSet<&'static str>>,
    pub product_queries: AtomicU64,
}

impl FakeBackend {
    /// A backend with one category per kind and a few products.
    ///
    /// Products: 1 "Monstera" (stock 5), 2 "Pothos" (stock 0),
    /// 3 "Maceta de barro" (stock 10), 4 "Kit suculentas" (stock 2).
    pub fn seeded() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.try_lock().expect("fresh mutex");
            let plants = Category {
                id: CategoryId::new(1),
                name: "Plantas".to_owned(),
                kind: CategoryKind::Plant,
            };
            let pots = Category {
                id: CategoryId::new(2),
                name: "Macetas".to_owned(),
                kind: CategoryKind::Accessory,
            };
            let kits = Category {
                id: CategoryId::new(3),
                name: "Kits".to_owned(),
                kind: CategoryKind::Kit,
            };
            let product = |id: i32, name: &str, price: i64, stock: u32, category: &Category| {
                Product {
                    id: ProductId::new(id),
                    name: name.to_owned(),
                    description: Some(format!("{name} description")),
                    price: Decimal::new(price, 2),
                    stock,
                    category_id: category.id,
                    category: Some(category.clone()),
                    image_url: None,
                }
            };
            state.products = vec![
                product(1, "Monstera", 2500, 5, &plants),
                product(2, "Pothos", 1200, 0, &plants),
                product(3, "Maceta de barro", 800, 10, &pots),
                product(4, "Kit suculentas", 3000, 2, &kits),
            ];
            state.categories = vec![kits, pots, plants];
            state.next_id = 100;
        }
        backend
    }

    /// Make `operation` fail until cleared.
    pub async fn fail(&self, operation: &'static str) {
        self.failing.lock().await.insert(operation);
    }

    async fn check(&self, operation: &'static str) -> Result<(), RepositoryError> {
        if self.failing.lock().await.contains(operation) {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(format!(
                "injected failure in {operation}"
            ))));
        }
        Ok(())
    }

    /// Set a product's stock.
    pub async fn set_stock(&self, id: ProductId, stock: u32) {
        let mut state = self.state.lock().await;
        if let Some(product) = state.products.iter_mut().find(|p| p.id == id) {
            product.stock = stock;
        }
    }

    /// Quantities in the cart owned by `owner`, keyed by product.
    pub async fn cart_quantities(&self, owner: &Owner) -> Option<HashMap<ProductId, u32>> {
        let state = self.state.lock().await;
        let cart = state.carts.iter().find(|c| &c.owner == owner)?;
        Some(
            state
                .cart_items
                .iter()
                .filter(|item| item.cart_id == cart.id)
                .map(|item| (item.product_id, item.quantity))
                .collect(),
        )
    }
}

#[async_trait]
impl CatalogBackend for FakeBackend {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        self.check("list_categories").await?;
        let mut categories = self.state.lock().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        self.check("list_products").await?;
        self.product_queries.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.check("get_product").await?;
        Ok(self.state.lock().await.product(id))
    }
}

#[async_trait]
impl CartBackend for FakeBackend {
    async fn find_cart(&self, owner: &Owner) -> Result<Option<Cart>, RepositoryError> {
        self.check("find_cart").await?;
        let state = self.state.lock().await;
        Ok(state.carts.iter().find(|c| &c.owner == owner).cloned())
    }

    async fn create_cart(&self, owner: &Owner) -> Result<Cart, RepositoryError> {
        self.check("create_cart").await?;
        let mut state = self.state.lock().await;
        if state.carts.iter().any(|c| &c.owner == owner) {
            return Err(RepositoryError::Conflict("cart already exists".to_owned()));
        }
        let cart = Cart {
            id: CartId::new(state.next()),
            owner: owner.clone(),
        };
        state.carts.push(cart.clone());
        Ok(cart)
    }

    async fn delete_cart(&self, id: CartId) -> Result<(), RepositoryError> {
        self.check("delete_cart").await?;
        let mut state = self.state.lock().await;
        state.carts.retain(|c| c.id != id);
        state.cart_items.retain(|i| i.cart_id != id);
        Ok(())
    }

    async fn list_cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        self.check("list_cart_items").await?;
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .map(|i| state.joined_item(i))
            .collect())
    }

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        self.check("find_cart_item").await?;
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .iter()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .map(|i| state.joined_item(i)))
    }

    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        self.check("get_cart_item").await?;
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .iter()
            .find(|i| i.id == id)
            .map(|i| state.joined_item(i)))
    }

    async fn insert_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError> {
        self.check("insert_cart_item").await?;
        let mut state = self.state.lock().await;
        if state
            .cart_items
            .iter()
            .any(|i| i.cart_id == cart_id && i.product_id == product_id)
        {
            return Err(RepositoryError::Conflict("cart item already exists".to_owned()));
        }
        let item = CartItem {
            id: CartItemId::new(state.next()),
            cart_id,
            product_id,
            quantity,
            product: None,
        };
        state.cart_items.push(item.clone());
        Ok(state.joined_item(&item))
    }

    async fn set_cart_item_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        self.check("set_cart_item_quantity").await?;
        let mut state = self.state.lock().await;
        let item = state
            .cart_items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(RepositoryError::NotFound)?;
        item.quantity = quantity;
        Ok(())
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<bool, RepositoryError> {
        self.check("delete_cart_item").await?;
        let mut state = self.state.lock().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|i| i.id != id);
        Ok(state.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        self.check("clear_cart").await?;
        self.state
            .lock()
            .await
            .cart_items
            .retain(|i| i.cart_id != cart_id);
        Ok(())
    }
}

#[async_trait]
impl FavoritesBackend for FakeBackend {
    async fn list_collections(
        &self,
        owner: &Owner,
    ) -> Result<Vec<FavoriteCollection>, RepositoryError> {
        self.check("list_collections").await?;
        let state = self.state.lock().await;
        Ok(state
            .collections
            .iter()
            .filter(|c| &c.owner == owner)
            .cloned()
            .collect())
    }

    async fn get_collection(
        &self,
        id: CollectionId,
    ) -> Result<Option<FavoriteCollection>, RepositoryError> {
        self.check("get_collection").await?;
        let state = self.state.lock().await;
        Ok(state.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn create_collection(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<FavoriteCollection, RepositoryError> {
        self.check("create_collection").await?;
        let mut state = self.state.lock().await;
        let collection = FavoriteCollection {
            id: CollectionId::new(state.next()),
            name: name.to_owned(),
            owner: owner.clone(),
            items: Vec::new(),
        };
        state.collections.push(collection.clone());
        Ok(collection)
    }

    async fn rename_collection(
        &self,
        id: CollectionId,
        name: &str,
    ) -> Result<(), RepositoryError> {
        self.check("rename_collection").await?;
        let mut state = self.state.lock().await;
        let collection = state
            .collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        name.clone_into(&mut collection.name);
        Ok(())
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<bool, RepositoryError> {
        self.check("delete_collection").await?;
        let mut state = self.state.lock().await;
        let before = state.collections.len();
        state.collections.retain(|c| c.id != id);
        Ok(state.collections.len() < before)
    }

    async fn transfer_collection(
        &self,
        id: CollectionId,
        owner: &Owner,
    ) -> Result<(), RepositoryError> {
        self.check("transfer_collection").await?;
        let mut state = self.state.lock().await;
        let collection = state
            .collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        collection.owner = owner.clone();
        Ok(())
    }

    async fn insert_favorite_item(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<FavoriteItem, RepositoryError> {
        self.check("insert_favorite_item").await?;
        let mut state = self.state.lock().await;
        let id = FavoriteItemId::new(state.next());
        let product = state.product(product_id);
        let collection = state
            .collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or(RepositoryError::NotFound)?;
        if collection.contains(product_id) {
            return Err(RepositoryError::Conflict("favorite already exists".to_owned()));
        }
        let item = FavoriteItem {
            id,
            collection_id,
            product_id,
            product,
        };
        collection.items.push(item.clone());
        Ok(item)
    }

    async fn delete_favorite_item(
        &self,
        collection_id: CollectionId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        self.check("delete_favorite_item").await?;
        let mut state = self.state.lock().await;
        let Some(collection) = state.collections.iter_mut().find(|c| c.id == collection_id)
        else {
            return Ok(false);
        };
        let before = collection.items.len();
        collection.items.retain(|i| i.product_id != product_id);
        Ok(collection.items.len() < before)
    }
}

#[async_trait]
impl AccountBackend for FakeBackend {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        self.check("find_user_by_email").await?;
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| &u.email == email).cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.check("get_user").await?;
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(
        &self,
        email: &Email,
        display_name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError> {
        self.check("create_user").await?;
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| &u.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let user = User {
            id: UserId::new(state.next()),
            email: email.clone(),
            display_name: display_name.map(str::to_owned),
            created_at: Utc::now(),
        };
        if let Some(hash) = password_hash {
            state.passwords.insert(user.id, hash.to_owned());
        }
        state.users.push(user.clone());
        Ok(user)
    }

    async fn password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        self.check("password_hash").await?;
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| &u.email == email)
            .and_then(|u| state.passwords.get(&u.id).map(|h| (u.clone(), h.clone()))))
    }

    async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        self.check("set_password_hash").await?;
        self.state
            .lock()
            .await
            .passwords
            .insert(id, password_hash.to_owned());
        Ok(())
    }

    async fn create_reset_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.check("create_reset_token").await?;
        self.state
            .lock()
            .await
            .reset_tokens
            .push((user_id, token_hash.to_owned(), expires_at, false));
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        self.check("consume_reset_token").await?;
        let mut state = self.state.lock().await;
        let token = state
            .reset_tokens
            .iter_mut()
            .find(|(_, hash, expires_at, used)| hash == token_hash && !used && *expires_at > now);
        Ok(token.map(|(user_id, _, _, used)| {
            *used = true;
            *user_id
        }))
    }

    async fn find_oauth_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        self.check("find_oauth_identity").await?;
        let state = self.state.lock().await;
        Ok(state
            .oauth
            .get(&(provider.to_owned(), subject.to_owned()))
            .copied())
    }

    async fn link_oauth_identity(
        &self,
        provider: &str,
        subject: &str,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        self.check("link_oauth_identity").await?;
        self.state
            .lock()
            .await
            .oauth
            .entry((provider.to_owned(), subject.to_owned()))
            .or_insert(user_id);
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check("ping").await
    }
}
