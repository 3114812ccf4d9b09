//! Redis container for stream backend tests

use redis::Client;
use redis::aio::ConnectionManager;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

const IMAGE_TAG: &str = "8-alpine";

/// Throwaway Redis; streams and consumer groups start empty.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    connection: ConnectionManager,
    pub url: String,
}

impl TestRedis {
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag(IMAGE_TAG)
            .start()
            .await
            .expect("redis container should start");
        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("redis port should be mapped");
        let url = format!("redis://127.0.0.1:{port}");

        let client = Client::open(url.as_str()).expect("redis url should parse");
        let connection = ConnectionManager::new(client)
            .await
            .expect("test redis should accept connections");

        tracing::info!(port, "Test Redis ready");
        Self {
            _container: container,
            connection,
            url,
        }
    }

    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}
