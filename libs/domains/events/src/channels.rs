use stream_worker::StreamDef;

pub const USER_EVENTS_EXCHANGE: &str = "user_events";

/// `user_events:user.lifecycle`, consumed by the products service.
///
/// Every lifecycle change for every user travels on this one stream and is read by a
/// single consumer group, so a user's events are applied in the order they were published.
pub struct UserLifecycleStream;

impl StreamDef for UserLifecycleStream {
    const EXCHANGE: &'static str = USER_EVENTS_EXCHANGE;
    const ROUTING_KEY: &'static str = "user.lifecycle";
    const QUEUE: &'static str = "products.user_lifecycle";
}
