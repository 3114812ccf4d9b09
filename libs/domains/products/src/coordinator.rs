//! Consistency Coordinator
//!
//! Keeps a user's products in line with the user's lifecycle: inactive or deleted owners
//! have every product soft-deleted, active owners get them back.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ProductResult;
use crate::repository::ProductStore;

#[derive(Clone)]
pub struct ConsistencyCoordinator {
    store: Arc<dyn ProductStore>,
}

impl ConsistencyCoordinator {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    /// Soft-delete every live product of `user_id`. Re-running is a no-op.
    #[instrument(skip(self))]
    pub async fn deactivate_all(&self, user_id: Uuid) -> ProductResult<u64> {
        let affected = self.store.set_deleted_by_owner(user_id, true).await?;
        info!(user_id = %user_id, affected, "Deactivated user's products");
        Ok(affected)
    }

    /// Restore every soft-deleted product of `user_id` as it was.
    #[instrument(skip(self))]
    pub async fn reactivate_all(&self, user_id: Uuid) -> ProductResult<u64> {
        let affected = self.store.set_deleted_by_owner(user_id, false).await?;
        info!(user_id = %user_id, affected, "Reactivated user's products");
        Ok(affected)
    }

    pub async fn apply_status(&self, user_id: Uuid, is_active: bool) -> ProductResult<u64> {
        if is_active {
            self.reactivate_all(user_id).await
        } else {
            self.deactivate_all(user_id).await
        }
    }
}
