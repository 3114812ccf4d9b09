use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_worker::StreamJob;
use uuid::Uuid;

/// A user was soft-deleted. Consumers deactivate everything the user owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl UserDeletedEvent {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            timestamp: Utc::now(),
        }
    }
}

impl StreamJob for UserDeletedEvent {
    fn job_id(&self) -> String {
        self.event_id.to_string()
    }
}

/// A user's active flag was set by an admin, or the user was restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusChangedEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    pub timestamp: DateTime<Utc>,
}

impl UserStatusChangedEvent {
    pub fn new(user_id: Uuid, is_active: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            is_active,
            timestamp: Utc::now(),
        }
    }
}

impl StreamJob for UserStatusChangedEvent {
    fn job_id(&self) -> String {
        self.event_id.to_string()
    }
}

/// Envelope carried on [`crate::UserLifecycleStream`], tagged with `eventType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum UserLifecycleEvent {
    #[serde(rename = "user.deleted")]
    Deleted(UserDeletedEvent),
    #[serde(rename = "user.status_changed")]
    StatusChanged(UserStatusChangedEvent),
}

impl UserLifecycleEvent {
    pub fn event_id(&self) -> Uuid {
        match self {
            Self::Deleted(e) => e.event_id,
            Self::StatusChanged(e) => e.event_id,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Self::Deleted(e) => e.user_id,
            Self::StatusChanged(e) => e.user_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Deleted(_) => "user.deleted",
            Self::StatusChanged(_) => "user.status_changed",
        }
    }
}

impl From<UserDeletedEvent> for UserLifecycleEvent {
    fn from(event: UserDeletedEvent) -> Self {
        Self::Deleted(event)
    }
}

impl From<UserStatusChangedEvent> for UserLifecycleEvent {
    fn from(event: UserStatusChangedEvent) -> Self {
        Self::StatusChanged(event)
    }
}

impl StreamJob for UserLifecycleEvent {
    fn job_id(&self) -> String {
        self.event_id().to_string()
    }
}
