//! Products slice: catalog listings, favorites and the active collection.

use serde::{Deserialize, Serialize};
use vivero_core::CollectionId;

use super::Status;
use crate::models::{Category, FavoriteCollection, Product};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductsState {
    pub status: Status,
    #[serde(skip)]
    pub products: Vec<Product>,
    #[serde(skip)]
    pub categories: Vec<Category>,
    #[serde(skip)]
    pub selected: Option<Product>,
    #[serde(skip)]
    pub collections: Vec<FavoriteCollection>,
    /// Collection that favorite toggles go to. UI state only.
    pub active_collection: Option<CollectionId>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ProductsAction {
    Pending,
    ProductsLoaded(Vec<Product>),
    CategoriesLoaded(Vec<Category>),
    ProductLoaded(Product),
    CollectionsLoaded(Vec<FavoriteCollection>),
    /// A toggle landed in `collection_id`, which becomes the active one.
    FavoriteToggled {
        collections: Vec<FavoriteCollection>,
        collection_id: CollectionId,
    },
    SetActiveCollection(Option<CollectionId>),
    Rejected(String),
}

impl ProductsState {
    pub fn reduce(&mut self, action: ProductsAction) {
        match action {
            ProductsAction::Pending => {
                self.status = Status::Loading;
                self.error = None;
            }
            ProductsAction::ProductsLoaded(products) => {
                self.succeed();
                self.products = products;
            }
            ProductsAction::CategoriesLoaded(categories) => {
                self.succeed();
                self.categories = categories;
            }
            ProductsAction::ProductLoaded(product) => {
                self.succeed();
                self.selected = Some(product);
            }
            ProductsAction::CollectionsLoaded(collections) => {
                self.succeed();
                self.collections = collections;
                self.forget_missing_active();
            }
            ProductsAction::FavoriteToggled {
                collections,
                collection_id,
            } => {
                self.succeed();
                self.collections = collections;
                self.active_collection = Some(collection_id);
            }
            ProductsAction::SetActiveCollection(id) => {
                self.active_collection = id;
            }
            ProductsAction::Rejected(message) => {
                self.status = Status::Failed;
                self.error = Some(message);
            }
        }
    }

    pub const fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    fn succeed(&mut self) {
        self.status = Status::Succeeded;
        self.error = None;
    }

    /// Drop an active collection that no longer exists (deleted, or owned by
    /// someone else after sign-out).
    fn forget_missing_active(&mut self) {
        if let Some(id) = self.active_collection
            && !self.collections.iter().any(|c| c.id == id)
        {
            self.active_collection = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use vivero_core::UserId;

    use super::*;
    use crate::models::Owner;

    fn collection(id: i32) -> FavoriteCollection {
        FavoriteCollection {
            id: CollectionId::new(id),
            name: format!("Colección {id}"),
            owner: Owner::User(UserId::new(1)),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_toggle_activates_collection() {
        let mut state = ProductsState::default();
        state.reduce(ProductsAction::FavoriteToggled {
            collections: vec![collection(1), collection(2)],
            collection_id: CollectionId::new(2),
        });
        assert_eq!(state.active_collection, Some(CollectionId::new(2)));
        assert_eq!(state.collections.len(), 2);
    }

    #[test]
    fn test_collections_loaded_drops_stale_active() {
        let mut state = ProductsState::default();
        state.reduce(ProductsAction::SetActiveCollection(Some(CollectionId::new(9))));
        state.reduce(ProductsAction::CollectionsLoaded(vec![collection(1)]));
        assert!(state.active_collection.is_none());

        state.reduce(ProductsAction::SetActiveCollection(Some(CollectionId::new(1))));
        state.reduce(ProductsAction::CollectionsLoaded(vec![collection(1)]));
        assert_eq!(state.active_collection, Some(CollectionId::new(1)));
    }

    #[test]
    fn test_rejected_then_pending() {
        let mut state = ProductsState::default();
        state.reduce(ProductsAction::Rejected("No se pudo cargar el catálogo.".to_owned()));
        assert_eq!(state.status, Status::Failed);
        assert!(state.error.is_some());

        state.reduce(ProductsAction::Pending);
        assert_eq!(state.status, Status::Loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_fulfilled_clears_previous_error() {
        let mut state = ProductsState::default();
        state.reduce(ProductsAction::Rejected("No se pudo cargar el catálogo.".to_owned()));
        state.reduce(ProductsAction::CollectionsLoaded(vec![collection(1)]));
        assert_eq!(state.status, Status::Succeeded);
        assert!(state.error.is_none());
    }
}
