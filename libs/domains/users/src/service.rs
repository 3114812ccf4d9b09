//! User Service - account lifecycle and authorization rules

use axum_helpers::{JwtAuth, JwtClaims};
use chrono::Utc;
use domain_events::{UserDeletedEvent, UserEventPublisher, UserStatusChangedEvent};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::AccountConfig;
use crate::error::{UserError, UserResult};
use crate::models::{
    ChangePasswordRequest, ConfirmEmailRequest, ForgotPasswordRequest, LoginRequest,
    LoginResponse, ResetPasswordRequest, Role, UpdateUserRequest, User, UserFilter, UserResponse,
    normalize_email,
};
use crate::notifier::Notifier;
use crate::password::{generate_token, hash_password, verify_password};
use crate::repository::UserRepository;

/// The authenticated caller, as far as authorization is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub is_admin: bool,
    pub email_confirmed: bool,
}

impl TryFrom<&JwtClaims> for Actor {
    type Error = axum_helpers::AppError;

    fn try_from(claims: &JwtClaims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims.user_id()?,
            is_admin: claims.is_admin(),
            email_confirmed: claims.email_confirmed,
        })
    }
}

impl Actor {
    fn ensure_self_or_admin(&self, user_id: Uuid) -> UserResult<()> {
        if self.is_admin || self.id == user_id {
            Ok(())
        } else {
            warn!(actor = %self.id, target_user = %user_id, "Access denied");
            Err(UserError::Forbidden)
        }
    }

    fn ensure_admin(&self) -> UserResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            warn!(actor = %self.id, "Admin role required");
            Err(UserError::Forbidden)
        }
    }
}

/// Service layer for User business logic
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    events: Arc<dyn UserEventPublisher>,
    notifier: Arc<dyn Notifier>,
    jwt: JwtAuth,
    config: AccountConfig,
}

impl<R: UserRepository> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            events: self.events.clone(),
            notifier: self.notifier.clone(),
            jwt: self.jwt.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: UserRepository> UserService<R> {
    pub fn new(
        repository: R,
        events: Arc<dyn UserEventPublisher>,
        notifier: Arc<dyn Notifier>,
        jwt: JwtAuth,
        config: AccountConfig,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            events,
            notifier,
            jwt,
            config,
        }
    }

    pub fn jwt(&self) -> &JwtAuth {
        &self.jwt
    }

    /// Load a user that has not been soft-deleted.
    async fn load_live(&self, id: Uuid) -> UserResult<User> {
        match self.repository.get_by_id(id).await? {
            Some(user) if !user.is_deleted => Ok(user),
            _ => Err(UserError::NotFound(id)),
        }
    }

    async fn load_any(&self, id: Uuid) -> UserResult<User> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: crate::models::RegisterRequest) -> UserResult<UserResponse> {
        input.validate()?;

        let email = normalize_email(&input.email);
        if self.repository.email_exists(&email).await? {
            return Err(UserError::DuplicateEmail(email));
        }

        let password_hash = hash_password(&input.password)?;
        let token = generate_token();
        let user = self
            .repository
            .create(User::new(&email, input.name, password_hash, token.clone()))
            .await?;

        self.notifier
            .send_confirmation(&user, &self.config.confirmation_link(&token))
            .await;

        info!(user_id = %user.id, "Registered user");
        Ok(user.into())
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginRequest) -> UserResult<LoginResponse> {
        let user = self
            .repository
            .get_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }
        if user.is_deleted {
            return Err(UserError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(UserError::AccountDisabled);
        }
        if !user.email_confirmed {
            return Err(UserError::EmailNotConfirmed);
        }

        let access_token = self
            .jwt
            .issue(user.id, &user.email, user.role.as_str(), user.email_confirmed)
            .map_err(|e| UserError::Token(e.to_string()))?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.ttl_secs(),
            user: user.into(),
        })
    }

    #[instrument(skip(self, input))]
    pub async fn confirm_email(&self, input: ConfirmEmailRequest) -> UserResult<()> {
        let mut user = self
            .repository
            .get_by_confirmation_token(&input.token)
            .await?
            .ok_or(UserError::InvalidToken)?;

        if user.is_deleted || user.email_confirmed {
            return Err(UserError::InvalidToken);
        }

        user.email_confirmed = true;
        user.confirmation_token = None;
        user.touch();
        self.repository.update(user).await?;
        Ok(())
    }

    /// Always succeeds for unknown or unusable accounts, so callers cannot probe emails.
    #[instrument(skip(self, input))]
    pub async fn forgot_password(&self, input: ForgotPasswordRequest) -> UserResult<()> {
        let Some(mut user) = self
            .repository
            .get_by_email(&normalize_email(&input.email))
            .await?
        else {
            return Ok(());
        };

        if user.is_deleted || !user.is_active {
            return Ok(());
        }

        let token = generate_token();
        user.reset_token = Some(token.clone());
        user.reset_token_expires_at = Some(Utc::now() + self.config.reset_token_ttl());
        user.touch();
        let user = self.repository.update(user).await?;

        self.notifier
            .send_password_reset(&user, &self.config.reset_link(&token))
            .await;
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn reset_password(&self, input: ResetPasswordRequest) -> UserResult<()> {
        input.validate()?;

        let mut user = self
            .repository
            .get_by_reset_token(&input.token)
            .await?
            .ok_or(UserError::InvalidToken)?;

        if user.is_deleted || user.reset_token_expired(Utc::now()) {
            return Err(UserError::InvalidToken);
        }

        user.password_hash = hash_password(&input.new_password)?;
        user.reset_token = None;
        user.reset_token_expires_at = None;
        user.touch();
        self.repository.update(user).await?;
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        actor: Actor,
        id: Uuid,
        input: ChangePasswordRequest,
    ) -> UserResult<()> {
        input.validate()?;
        if actor.id != id {
            warn!(actor = %actor.id, target_user = %id, "Password change for another user denied");
            return Err(UserError::Forbidden);
        }

        let mut user = self.load_live(id).await?;
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        user.password_hash = hash_password(&input.new_password)?;
        user.touch();
        self.repository.update(user).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, actor: Actor, id: Uuid) -> UserResult<UserResponse> {
        actor.ensure_self_or_admin(id)?;
        Ok(self.load_live(id).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, actor: Actor, filter: UserFilter) -> UserResult<Vec<UserResponse>> {
        actor.ensure_admin()?;
        let users = self.repository.list(filter).await?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(
        &self,
        actor: Actor,
        id: Uuid,
        input: UpdateUserRequest,
    ) -> UserResult<UserResponse> {
        input.validate()?;
        actor.ensure_self_or_admin(id)?;
        if !actor.email_confirmed {
            return Err(UserError::EmailConfirmationRequired);
        }

        let mut user = self.load_live(id).await?;

        if let Some(email) = input.email.as_deref().map(normalize_email) {
            if email != user.email && self.repository.email_exists(&email).await? {
                return Err(UserError::DuplicateEmail(email));
            }
            user.email = email;
        }
        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(password) = input.password.as_deref() {
            user.password_hash = hash_password(password)?;
        }

        user.touch();
        Ok(self.repository.update(user).await?.into())
    }

    /// Soft delete, then publish `user.deleted`.
    ///
    /// Repeating the call re-publishes, so a caller can retry after a failed publish.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, actor: Actor, id: Uuid) -> UserResult<()> {
        actor.ensure_self_or_admin(id)?;
        let mut user = self.load_any(id).await?;

        if !user.is_deleted {
            user.is_deleted = true;
            user.touch();
            self.repository.update(user).await?;
            info!(user_id = %id, "Soft-deleted user");
        }

        self.events.user_deleted(&UserDeletedEvent::new(id)).await?;
        Ok(())
    }

    /// Clear the deleted flag and publish the user's current status.
    #[instrument(skip(self))]
    pub async fn restore_user(&self, actor: Actor, id: Uuid) -> UserResult<()> {
        actor.ensure_admin()?;
        let mut user = self.load_any(id).await?;

        if user.is_deleted {
            user.is_deleted = false;
            user.touch();
            user = self.repository.update(user).await?;
            info!(user_id = %id, "Restored user");
        }

        self.events
            .user_status_changed(&UserStatusChangedEvent::new(id, user.is_active))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, actor: Actor, id: Uuid, is_active: bool) -> UserResult<()> {
        actor.ensure_admin()?;
        let mut user = self.load_live(id).await?;

        if user.is_active != is_active {
            user.is_active = is_active;
            user.touch();
            self.repository.update(user).await?;
            info!(user_id = %id, is_active, "Changed user status");
        }

        self.events
            .user_status_changed(&UserStatusChangedEvent::new(id, is_active))
            .await?;
        Ok(())
    }

    /// Create or promote an admin account. Used for bootstrapping.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(&self, email: &str, name: &str, password: &str) -> UserResult<UserResponse> {
        let email = normalize_email(email);
        let user = match self.repository.get_by_email(&email).await? {
            Some(mut user) => {
                user.role = Role::Admin;
                user.email_confirmed = true;
                user.confirmation_token = None;
                user.touch();
                self.repository.update(user).await?
            }
            None => {
                let mut user = User::new(&email, name.to_string(), hash_password(password)?, generate_token());
                user.role = Role::Admin;
                user.email_confirmed = true;
                user.confirmation_token = None;
                self.repository.create(user).await?
            }
        };
        info!(user_id = %user.id, "Admin account ready");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegisterRequest;
    use crate::notifier::LogNotifier;
    use crate::repository::{InMemoryUserRepository, MockUserRepository};
    use axum_helpers::JwtConfig;
    use domain_events::{StreamUserEventPublisher, UserLifecycleStream};
    use stream_worker::{InMemoryStreamBackend, StreamDef};

    struct Harness {
        service: UserService<InMemoryUserRepository>,
        repo: InMemoryUserRepository,
        backend: Arc<InMemoryStreamBackend>,
    }

    fn jwt() -> JwtAuth {
        JwtAuth::new(&JwtConfig::new("this-is-a-valid-secret-with-32-chars!").unwrap())
    }

    fn harness() -> Harness {
        let repo = InMemoryUserRepository::new();
        let backend = Arc::new(InMemoryStreamBackend::new());
        let service = UserService::new(
            repo.clone(),
            Arc::new(StreamUserEventPublisher::new(backend.clone())),
            Arc::new(LogNotifier),
            jwt(),
            AccountConfig::default(),
        );
        Harness {
            service,
            repo,
            backend,
        }
    }

    fn admin() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            is_admin: true,
            email_confirmed: true,
        }
    }

    fn actor_for(id: Uuid) -> Actor {
        Actor {
            id,
            is_admin: false,
            email_confirmed: true,
        }
    }

    async fn registered(h: &Harness, email: &str) -> User {
        let created = h
            .service
            .register(RegisterRequest {
                name: "Alice".into(),
                email: email.into(),
                password: "password1".into(),
            })
            .await
            .unwrap();
        h.repo.get_by_id(created.id).await.unwrap().unwrap()
    }

    async fn confirmed(h: &Harness, email: &str) -> User {
        let user = registered(h, email).await;
        h.service
            .confirm_email(ConfirmEmailRequest {
                token: user.confirmation_token.clone().unwrap(),
            })
            .await
            .unwrap();
        h.repo.get_by_id(user.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_register_normalizes_and_rejects_duplicates() {
        let h = harness();
        let user = registered(&h, "Alice@Example.com").await;
        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_active);
        assert!(!user.email_confirmed);
        assert_ne!(user.password_hash, "password1");

        let dup = h
            .service
            .register(RegisterRequest {
                name: "Other".into(),
                email: "ALICE@example.com".into(),
                password: "password1".into(),
            })
            .await;
        assert!(matches!(dup, Err(UserError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_login_requires_confirmed_email() {
        let h = harness();
        registered(&h, "a@example.com").await;

        let result = h
            .service
            .login(LoginRequest {
                email: "a@example.com".into(),
                password: "password1".into(),
            })
            .await;
        assert!(matches!(result, Err(UserError::EmailNotConfirmed)));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        let response = h
            .service
            .login(LoginRequest {
                email: "A@example.com".into(),
                password: "password1".into(),
            })
            .await
            .unwrap();

        let claims = h.service.jwt().verify(&response.access_token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "User");
        assert!(claims.email_confirmed);
        assert_eq!(response.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_inactive_account() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        let wrong = h
            .service
            .login(LoginRequest {
                email: "a@example.com".into(),
                password: "password2".into(),
            })
            .await;
        assert!(matches!(wrong, Err(UserError::InvalidCredentials)));

        h.service.set_status(admin(), user.id, false).await.unwrap();
        let inactive = h
            .service
            .login(LoginRequest {
                email: "a@example.com".into(),
                password: "password1".into(),
            })
            .await;
        assert!(matches!(inactive, Err(UserError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_confirmation_token_is_single_use() {
        let h = harness();
        let user = registered(&h, "a@example.com").await;
        let token = user.confirmation_token.clone().unwrap();

        h.service
            .confirm_email(ConfirmEmailRequest { token: token.clone() })
            .await
            .unwrap();
        let again = h.service.confirm_email(ConfirmEmailRequest { token }).await;
        assert!(matches!(again, Err(UserError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_forgot_password_is_silent_for_unknown_email() {
        let h = harness();
        h.service
            .forgot_password(ForgotPasswordRequest {
                email: "nobody@example.com".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        h.service
            .forgot_password(ForgotPasswordRequest {
                email: "a@example.com".into(),
            })
            .await
            .unwrap();
        let token = h
            .repo
            .get_by_id(user.id)
            .await
            .unwrap()
            .unwrap()
            .reset_token
            .unwrap();

        let reset = ResetPasswordRequest {
            token: token.clone(),
            new_password: "newpass123".into(),
            confirm_password: "newpass123".into(),
        };
        h.service.reset_password(reset.clone()).await.unwrap();

        // Single use
        assert!(matches!(
            h.service.reset_password(reset).await,
            Err(UserError::InvalidToken)
        ));

        h.service
            .login(LoginRequest {
                email: "a@example.com".into(),
                password: "newpass123".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let h = harness();
        let mut user = confirmed(&h, "a@example.com").await;
        user.reset_token = Some("stale".into());
        user.reset_token_expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        h.repo.update(user).await.unwrap();

        let result = h
            .service
            .reset_password(ResetPasswordRequest {
                token: "stale".into(),
                new_password: "newpass123".into(),
                confirm_password: "newpass123".into(),
            })
            .await;
        assert!(matches!(result, Err(UserError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_change_password_checks_current() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        let wrong = h
            .service
            .change_password(
                actor_for(user.id),
                user.id,
                ChangePasswordRequest {
                    current_password: "nope12345".into(),
                    new_password: "newpass123".into(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(UserError::InvalidCredentials)));

        let other = h
            .service
            .change_password(
                actor_for(Uuid::new_v4()),
                user.id,
                ChangePasswordRequest {
                    current_password: "password1".into(),
                    new_password: "newpass123".into(),
                },
            )
            .await;
        assert!(matches!(other, Err(UserError::Forbidden)));
    }

    #[tokio::test]
    async fn test_get_user_is_self_or_admin() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        assert!(h.service.get_user(actor_for(user.id), user.id).await.is_ok());
        assert!(h.service.get_user(admin(), user.id).await.is_ok());
        assert!(matches!(
            h.service.get_user(actor_for(Uuid::new_v4()), user.id).await,
            Err(UserError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_update_requires_confirmed_caller() {
        let h = harness();
        let user = registered(&h, "a@example.com").await;

        let unconfirmed = Actor {
            email_confirmed: false,
            ..actor_for(user.id)
        };
        let result = h
            .service
            .update_user(
                unconfirmed,
                user.id,
                UpdateUserRequest {
                    name: Some("New".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserError::EmailConfirmationRequired)));
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;
        confirmed(&h, "b@example.com").await;

        let result = h
            .service
            .update_user(
                actor_for(user.id),
                user.id,
                UpdateUserRequest {
                    email: Some("B@example.com".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_publishes_each_time() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        h.service.delete_user(actor_for(user.id), user.id).await.unwrap();
        h.service.delete_user(admin(), user.id).await.unwrap();

        let stored = h.repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(h.backend.stream_len(&UserLifecycleStream::stream_key()), 2);

        // Deleted users disappear from reads
        assert!(matches!(
            h.service.get_user(admin(), user.id).await,
            Err(UserError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_publish_failure_is_503_but_state_persists() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;
        h.backend
            .fail_appends(&UserLifecycleStream::stream_key(), true);

        let result = h.service.delete_user(admin(), user.id).await;
        assert!(matches!(result, Err(UserError::EventPublish(_))));
        assert!(h.repo.get_by_id(user.id).await.unwrap().unwrap().is_deleted);

        // Retry after the channel recovers
        h.backend
            .fail_appends(&UserLifecycleStream::stream_key(), false);
        h.service.delete_user(admin(), user.id).await.unwrap();
        assert_eq!(h.backend.stream_len(&UserLifecycleStream::stream_key()), 1);
    }

    #[tokio::test]
    async fn test_status_and_restore_publish_status_events() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;

        h.service.set_status(admin(), user.id, false).await.unwrap();
        h.service.delete_user(admin(), user.id).await.unwrap();
        h.service.restore_user(admin(), user.id).await.unwrap();

        let stored = h.repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.is_deleted);
        assert!(!stored.is_active);
        // status, deleted, restored: all on the one lifecycle stream
        assert_eq!(h.backend.stream_len(&UserLifecycleStream::stream_key()), 3);
    }

    #[tokio::test]
    async fn test_admin_only_operations() {
        let h = harness();
        let user = confirmed(&h, "a@example.com").await;
        let me = actor_for(user.id);

        assert!(matches!(
            h.service.set_status(me, user.id, false).await,
            Err(UserError::Forbidden)
        ));
        assert!(matches!(
            h.service.restore_user(me, user.id).await,
            Err(UserError::Forbidden)
        ));
        assert!(matches!(
            h.service.list_users(me, UserFilter::default()).await,
            Err(UserError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_repository_errors_propagate() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .returning(|_| Err(UserError::Database("connection reset".into())));

        let service = UserService::new(
            repo,
            Arc::new(StreamUserEventPublisher::new(Arc::new(
                InMemoryStreamBackend::new(),
            ))),
            Arc::new(LogNotifier),
            jwt(),
            AccountConfig::default(),
        );

        let result = service.get_user(admin(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(UserError::Database(_))));
    }
}
