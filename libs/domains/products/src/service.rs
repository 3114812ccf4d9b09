//! Product Service - Business logic layer

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::coordinator::ConsistencyCoordinator;
use crate::error::{ProductError, ProductResult};
use crate::models::{CreateProduct, Product, ProductFilter, SyncUserResponse, UpdateProduct};
use crate::oracle::UserStatusOracle;
use crate::repository::ProductStore;

/// Product service providing business logic operations
///
/// Owner-scoped writes go through the store's conditional updates; creation additionally
/// requires the users service to confirm the owner is active.
pub struct ProductService<S: ProductStore> {
    store: Arc<S>,
    oracle: Arc<dyn UserStatusOracle>,
    coordinator: ConsistencyCoordinator,
}

impl<S: ProductStore> Clone for ProductService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            oracle: self.oracle.clone(),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<S: ProductStore + 'static> ProductService<S> {
    pub fn new(store: S, oracle: Arc<dyn UserStatusOracle>) -> Self {
        let store = Arc::new(store);
        let coordinator = ConsistencyCoordinator::new(store.clone());
        Self {
            store,
            oracle,
            coordinator,
        }
    }

    /// The coordinator sharing this service's store, for wiring stream consumers.
    pub fn coordinator(&self) -> ConsistencyCoordinator {
        self.coordinator.clone()
    }

    /// Create a product owned by `owner_id` once the users service vouches for the owner.
    #[instrument(skip(self, input, bearer), fields(owner = %owner_id, product_name = %input.name))]
    pub async fn create_product(
        &self,
        owner_id: Uuid,
        bearer: &str,
        input: CreateProduct,
    ) -> ProductResult<Product> {
        input.validate()?;

        self.oracle.ensure_active(owner_id, bearer).await?;

        self.store.add(Product::new(owner_id, input)).await
    }

    /// Get a product by ID, soft-deleted ones included
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> ProductResult<Product> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> ProductResult<Vec<Product>> {
        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
            if min > max {
                return Err(ProductError::Validation(
                    "minPrice must not exceed maxPrice".to_string(),
                ));
            }
        }
        self.store.list(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: UpdateProduct,
    ) -> ProductResult<Product> {
        input.validate()?;
        self.store.update_owned(id, owner_id, input).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, owner_id: Uuid, id: Uuid) -> ProductResult<()> {
        self.store.soft_delete_owned(id, owner_id).await?;
        info!(product_id = %id, "Soft-deleted product");
        Ok(())
    }

    /// Synchronous counterpart of the user lifecycle events.
    #[instrument(skip(self))]
    pub async fn sync_user(&self, user_id: Uuid, is_active: bool) -> ProductResult<SyncUserResponse> {
        let affected = self.coordinator.apply_status(user_id, is_active).await?;
        Ok(SyncUserResponse {
            user_id,
            is_active,
            affected,
        })
    }
}
