use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{ProductError, ProductResult},
    models::{Product, ProductFilter, UpdateProduct},
    repository::ProductStore,
};

/// PostgreSQL implementation of ProductStore using SeaORM
#[derive(Clone)]
pub struct PgProductStore {
    db: DatabaseConnection,
}

impl PgProductStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lock the row for `(id, owner)` inside `txn`, or explain why it can't be written.
    async fn lock_owned(
        txn: &DatabaseTransaction,
        id: Uuid,
        owner_id: Uuid,
    ) -> ProductResult<entity::Model> {
        let model = entity::Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await?;

        match model {
            Some(m) if m.is_deleted => Err(ProductError::NotFound(id)),
            Some(m) if m.owner_id != owner_id => {
                tracing::warn!(product_id = %id, owner = %m.owner_id, caller = %owner_id, "Ownership mismatch");
                Err(ProductError::Forbidden)
            }
            Some(m) => Ok(m),
            None => Err(ProductError::NotFound(id)),
        }
    }
}

fn filter_condition(filter: &ProductFilter) -> Condition {
    let mut condition = Condition::all();

    if !filter.include_deleted {
        condition = condition.add(entity::Column::IsDeleted.eq(false));
    }
    if let Some(owner) = filter.user_id {
        condition = condition.add(entity::Column::OwnerId.eq(owner));
    }
    if let Some(available) = filter.is_available {
        condition = condition.add(entity::Column::IsAvailable.eq(available));
    }
    if let Some(min) = filter.min_price {
        condition = condition.add(entity::Column::Price.gte(min));
    }
    if let Some(max) = filter.max_price {
        condition = condition.add(entity::Column::Price.lte(max));
    }
    if let Some(term) = filter.search_pattern() {
        let pattern = contains_pattern(&term);
        condition = condition.add(
            Condition::any()
                .add(Expr::cust_with_values(
                    r"LOWER(name) LIKE $1 ESCAPE '\'",
                    [pattern.clone()],
                ))
                .add(Expr::cust_with_values(
                    r"LOWER(COALESCE(description, '')) LIKE $1 ESCAPE '\'",
                    [pattern],
                )),
        );
    }

    condition
}

/// `%term%` with LIKE wildcards in `term` escaped, so the term matches as a plain substring.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn get_by_id(&self, id: Uuid) -> ProductResult<Option<Product>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list(&self, filter: ProductFilter) -> ProductResult<Vec<Product>> {
        let models = entity::Entity::find()
            .filter(filter_condition(&filter))
            .order_by_desc(entity::Column::CreatedAt)
            .order_by_desc(entity::Column::Id)
            .limit(filter.capped_limit())
            .offset(filter.offset)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn add(&self, product: Product) -> ProductResult<Product> {
        let active: entity::ActiveModel = product.into();
        let model = active.insert(&self.db).await?;

        tracing::info!(product_id = %model.id, owner = %model.owner_id, "Created product");
        Ok(model.into())
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        changes: UpdateProduct,
    ) -> ProductResult<Product> {
        let txn = self.db.begin().await?;

        let mut product: Product = Self::lock_owned(&txn, id, owner_id).await?.into();
        product.apply(changes);
        let active: entity::ActiveModel = product.into();
        let model = active.update(&txn).await?;

        txn.commit().await?;
        Ok(model.into())
    }

    async fn soft_delete_owned(&self, id: Uuid, owner_id: Uuid) -> ProductResult<()> {
        let txn = self.db.begin().await?;

        Self::lock_owned(&txn, id, owner_id).await?;
        entity::Entity::update_many()
            .col_expr(entity::Column::IsDeleted, Expr::value(true))
            .col_expr(entity::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(entity::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn set_deleted_by_owner(&self, owner_id: Uuid, deleted: bool) -> ProductResult<u64> {
        let txn = self.db.begin().await?;

        let result = entity::Entity::update_many()
            .col_expr(entity::Column::IsDeleted, Expr::value(deleted))
            .col_expr(entity::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(entity::Column::OwnerId.eq(owner_id))
            .filter(entity::Column::IsDeleted.eq(!deleted))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(result.rows_affected)
    }
}
