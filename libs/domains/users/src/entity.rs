use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{Role, User};

/// Sea-ORM Entity for the users table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub email_confirmed: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub confirmation_token: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            password_hash: model.password_hash,
            // Unknown roles degrade to the least privileged one
            role: model.role.parse().unwrap_or(Role::User),
            is_active: model.is_active,
            is_deleted: model.is_deleted,
            email_confirmed: model.email_confirmed,
            confirmation_token: model.confirmation_token,
            reset_token: model.reset_token,
            reset_token_expires_at: model.reset_token_expires_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<User> for ActiveModel {
    fn from(user: User) -> Self {
        ActiveModel {
            id: Set(user.id),
            email: Set(user.email),
            name: Set(user.name),
            password_hash: Set(user.password_hash),
            role: Set(user.role.as_str().to_string()),
            is_active: Set(user.is_active),
            is_deleted: Set(user.is_deleted),
            email_confirmed: Set(user.email_confirmed),
            confirmation_token: Set(user.confirmation_token),
            reset_token: Set(user.reset_token),
            reset_token_expires_at: Set(user.reset_token_expires_at.map(Into::into)),
            created_at: Set(user.created_at.into()),
            updated_at: Set(user.updated_at.into()),
        }
    }
}
