//! Outbound account notifications (confirmation and password-reset links).

use async_trait::async_trait;
use tracing::info;

use crate::models::User;

/// Delivery is best effort: implementations log their own failures and never fail the
/// account operation that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(&self, user: &User, link: &str);

    async fn send_password_reset(&self, user: &User, link: &str);
}

/// Writes the links to the log. Used until a mail transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation(&self, user: &User, link: &str) {
        info!(user_id = %user.id, email = %user.email, link = %link, "Email confirmation link");
    }

    async fn send_password_reset(&self, user: &User, link: &str) {
        info!(user_id = %user.id, email = %user.email, link = %link, "Password reset link");
    }
}
