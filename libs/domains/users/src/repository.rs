use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{User, UserFilter};

/// Storage port for users.
///
/// Emails are compared case-insensitively; callers pass them already normalized.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DuplicateEmail` when the email is taken.
    async fn create(&self, user: User) -> UserResult<User>;

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>>;

    async fn get_by_confirmation_token(&self, token: &str) -> UserResult<Option<User>>;

    async fn get_by_reset_token(&self, token: &str) -> UserResult<Option<User>>;

    /// Non-deleted users, newest first.
    async fn list(&self, filter: UserFilter) -> UserResult<Vec<User>>;

    /// Replace the stored record. Fails with `NotFound` or `DuplicateEmail`.
    async fn update(&self, user: User) -> UserResult<User>;

    async fn email_exists(&self, email: &str) -> UserResult<bool>;
}

/// In-memory implementation of UserRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> UserResult<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(UserError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());
        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_confirmation_token(&self, token: &str) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.confirmation_token.as_deref() == Some(token))
            .cloned())
    }

    async fn get_by_reset_token(&self, token: &str) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list(&self, filter: UserFilter) -> UserResult<Vec<User>> {
        let users = self.users.read().await;

        let mut result: Vec<User> = users.values().filter(|u| !u.is_deleted).cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(result
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.capped_limit() as usize)
            .collect())
    }

    async fn update(&self, user: User) -> UserResult<User> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.id) {
            return Err(UserError::NotFound(user.id));
        }
        if users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(UserError::DuplicateEmail(user.email));
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> UserResult<bool> {
        let users = self.users.read().await;
        Ok(users.values().any(|u| u.email.eq_ignore_ascii_case(email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User::new(email, "Test".into(), "hash".into(), format!("token-{}", email))
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_case_insensitively() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("a@example.com")).await.unwrap();

        let mut dup = user("b@example.com");
        dup.email = "A@EXAMPLE.COM".into();
        assert!(matches!(
            repo.create(dup).await,
            Err(UserError::DuplicateEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_list_excludes_deleted() {
        let repo = InMemoryUserRepository::new();
        let mut gone = repo.create(user("gone@example.com")).await.unwrap();
        repo.create(user("here@example.com")).await.unwrap();

        gone.is_deleted = true;
        repo.update(gone).await.unwrap();

        let listed = repo.list(UserFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].email, "here@example.com");
    }

    #[tokio::test]
    async fn test_token_lookups() {
        let repo = InMemoryUserRepository::new();
        let mut created = repo.create(user("a@example.com")).await.unwrap();

        let found = repo
            .get_by_confirmation_token("token-a@example.com")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));

        created.reset_token = Some("reset".into());
        repo.update(created.clone()).await.unwrap();
        let found = repo.get_by_reset_token("reset").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let repo = InMemoryUserRepository::new();
        assert!(matches!(
            repo.update(user("a@example.com")).await,
            Err(UserError::NotFound(_))
        ));
    }
}
