use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ProductError, ProductResult};
use crate::models::{Product, ProductFilter, UpdateProduct};

/// Storage port for products.
///
/// Owner-scoped writes are conditional on `(id, owner)` and happen atomically: a missing or
/// soft-deleted product is `NotFound`, one owned by someone else is `Forbidden` and is left
/// untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Includes soft-deleted products.
    async fn get_by_id(&self, id: Uuid) -> ProductResult<Option<Product>>;

    /// Newest first.
    async fn list(&self, filter: ProductFilter) -> ProductResult<Vec<Product>>;

    async fn add(&self, product: Product) -> ProductResult<Product>;

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: UpdateProduct,
    ) -> ProductResult<Product>;

    async fn soft_delete_owned(&self, id: Uuid, owner_id: Uuid) -> ProductResult<()>;

    /// Flip `is_deleted` to `deleted` on every product of `owner_id` currently in the
    /// opposite state, as one unit. Returns the number of rows changed.
    async fn set_deleted_by_owner(&self, owner_id: Uuid, deleted: bool) -> ProductResult<u64>;
}

/// In-memory implementation of ProductStore (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve the product an owner-scoped write targets.
fn owned_mut(
    products: &mut HashMap<Uuid, Product>,
    id: Uuid,
    owner_id: Uuid,
) -> ProductResult<&mut Product> {
    match products.get_mut(&id) {
        Some(product) if product.is_deleted => Err(ProductError::NotFound(id)),
        Some(product) if product.owner_id != owner_id => {
            tracing::warn!(product_id = %id, owner = %product.owner_id, caller = %owner_id, "Ownership mismatch");
            Err(ProductError::Forbidden)
        }
        Some(product) => Ok(product),
        None => Err(ProductError::NotFound(id)),
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn get_by_id(&self, id: Uuid) -> ProductResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: ProductFilter) -> ProductResult<Vec<Product>> {
        let products = self.products.read().await;

        let mut matching: Vec<Product> = products
            .values()
            .filter(|p| p.matches(&filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.capped_limit() as usize)
            .collect())
    }

    async fn add(&self, product: Product) -> ProductResult<Product> {
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        tracing::info!(product_id = %product.id, owner = %product.owner_id, "Created product");
        Ok(product)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: UpdateProduct,
    ) -> ProductResult<Product> {
        let mut products = self.products.write().await;
        let product = owned_mut(&mut products, id, owner_id)?;
        product.apply(changes);
        Ok(product.clone())
    }

    async fn soft_delete_owned(&self, id: Uuid, owner_id: Uuid) -> ProductResult<()> {
        let mut products = self.products.write().await;
        let product = owned_mut(&mut products, id, owner_id)?;
        product.is_deleted = true;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn set_deleted_by_owner(&self, owner_id: Uuid, deleted: bool) -> ProductResult<u64> {
        let mut products = self.products.write().await;
        let now = Utc::now();
        let mut affected = 0;

        for product in products
            .values_mut()
            .filter(|p| p.owner_id == owner_id && p.is_deleted != deleted)
        {
            product.is_deleted = deleted;
            product.updated_at = now;
            affected += 1;
        }

        Ok(affected)
    }
}
