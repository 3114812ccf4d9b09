use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{UserError, UserResult},
    models::{User, UserFilter},
    repository::UserRepository,
};

/// PostgreSQL implementation of UserRepository using SeaORM
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: entity::Column, value: &str) -> UserResult<Option<User>> {
        let model = entity::Entity::find()
            .filter(column.eq(value))
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }
}

fn map_write_error(err: DbErr, user: &User) -> UserError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => UserError::DuplicateEmail(user.email.clone()),
        _ => match err {
            DbErr::RecordNotUpdated => UserError::NotFound(user.id),
            other => UserError::Database(other.to_string()),
        },
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> UserResult<User> {
        let active: entity::ActiveModel = user.clone().into();
        let model = active
            .insert(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user))?;

        tracing::info!(user_id = %model.id, "Created user");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let model = entity::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        self.find_one(entity::Column::Email, &email.to_lowercase())
            .await
    }

    async fn get_by_confirmation_token(&self, token: &str) -> UserResult<Option<User>> {
        self.find_one(entity::Column::ConfirmationToken, token).await
    }

    async fn get_by_reset_token(&self, token: &str) -> UserResult<Option<User>> {
        self.find_one(entity::Column::ResetToken, token).await
    }

    async fn list(&self, filter: UserFilter) -> UserResult<Vec<User>> {
        let models = entity::Entity::find()
            .filter(entity::Column::IsDeleted.eq(false))
            .order_by_desc(entity::Column::CreatedAt)
            .limit(filter.capped_limit())
            .offset(filter.offset)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update(&self, user: User) -> UserResult<User> {
        let active: entity::ActiveModel = user.clone().into();
        let model = active
            .update(&self.db)
            .await
            .map_err(|e| map_write_error(e, &user))?;

        tracing::debug!(user_id = %model.id, "Updated user");
        Ok(model.into())
    }

    async fn email_exists(&self, email: &str) -> UserResult<bool> {
        let count = entity::Entity::find()
            .filter(entity::Column::Email.eq(email.to_lowercase()))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }
}
