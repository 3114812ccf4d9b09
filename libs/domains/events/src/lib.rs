//! User lifecycle events
//!
//! The contract between the two services: event payloads, the stream channels they travel
//! on, and the publisher users-api calls after a lifecycle change is stored.
//!
//! Both event kinds are wrapped in [`UserLifecycleEvent`] (tagged by `eventType`) and share
//! the `user_events:user.lifecycle` stream, read by the `products.user_lifecycle` group.

mod channels;
mod models;
mod publisher;

pub use channels::UserLifecycleStream;
pub use models::{UserDeletedEvent, UserLifecycleEvent, UserStatusChangedEvent};
pub use publisher::{StreamUserEventPublisher, UserEventPublisher};
