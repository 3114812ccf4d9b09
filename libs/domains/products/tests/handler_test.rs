//! Handler tests for the Products domain
//!
//! Exercise the products router through `oneshot()`: owner guards, the status check
//! before creation, the sync endpoint, and user lifecycle events consumed from an
//! in-memory stream.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_helpers::{JwtAuth, JwtConfig, ROLE_ADMIN, ROLE_USER, ServiceAuth};
use domain_events::{
    StreamUserEventPublisher, UserDeletedEvent, UserEventPublisher, UserLifecycleStream,
};
use domain_products::*;
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use stream_worker::{InMemoryStreamBackend, StreamBackend, StreamDef, StreamWorker, WorkerConfig};
use tower::ServiceExt; // For oneshot()
use uuid::Uuid;

const API_KEY: &str = "internal-test-key";

/// Answers every status check the same way.
struct FixedOracle(bool);

#[async_trait]
impl UserStatusOracle for FixedOracle {
    async fn ensure_active(&self, user_id: Uuid, _bearer: &str) -> ProductResult<()> {
        if self.0 {
            Ok(())
        } else {
            Err(ProductError::AccountUnavailable(format!("{} inactive", user_id)))
        }
    }
}

struct TestApp {
    app: Router,
    jwt: JwtAuth,
    store: InMemoryProductStore,
    service: ProductService<InMemoryProductStore>,
}

impl TestApp {
    fn with_oracle(oracle: Arc<dyn UserStatusOracle>) -> Self {
        let jwt = JwtAuth::new(&JwtConfig::new("this-is-a-valid-secret-with-32-chars!").unwrap());
        let store = InMemoryProductStore::new();
        let service = ProductService::new(store.clone(), oracle);
        let app = Router::new().nest(
            "/api/products",
            handlers::router(
                service.clone(),
                jwt.clone(),
                ServiceAuth::new(jwt.clone(), Some(API_KEY.to_string())),
            ),
        );
        Self {
            app,
            jwt,
            store,
            service,
        }
    }

    fn new() -> Self {
        Self::with_oracle(Arc::new(FixedOracle(true)))
    }

    fn token_for(&self, user_id: Uuid) -> String {
        self.jwt
            .issue(user_id, "owner@example.com", ROLE_USER, true)
            .unwrap()
    }

    fn admin_token(&self) -> String {
        self.jwt
            .issue(Uuid::new_v4(), "admin@example.com", ROLE_ADMIN, true)
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(&self, owner: Uuid, name: &str) -> Value {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/products",
                Some(&self.token_for(owner)),
                json!({"name": name, "description": "Handmade", "price": "19.99"}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body
    }

    async fn list(&self, query: &str) -> Vec<Value> {
        let (status, body) = self
            .send(
                Request::get(format!("/api/products{}", query))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body.as_array().unwrap().clone()
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_create_returns_201_owned_by_caller() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();

    let body = app.create(owner, "Mug").await;

    assert_eq!(body["userId"], owner.to_string());
    assert_eq!(body["isDeleted"], false);
    assert_eq!(body["isAvailable"], true);
}

#[tokio::test]
async fn test_create_requires_token() {
    let app = TestApp::new();
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/products",
            None,
            json!({"name": "Mug", "price": "5"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_validates_input() {
    let app = TestApp::new();
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&app.token_for(Uuid::new_v4())),
            json!({"name": "", "price": "0"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_prices_the_column_cannot_hold() {
    let app = TestApp::new();
    for price in ["19.999", "10000000000"] {
        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/products",
                Some(&app.token_for(Uuid::new_v4())),
                json!({"name": "Lamp", "price": price}),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {}", price);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
    assert!(app.list("").await.is_empty());
}

#[tokio::test]
async fn test_inactive_owner_cannot_create_and_nothing_persists() {
    let app = TestApp::with_oracle(Arc::new(FixedOracle(false)));
    let owner = Uuid::new_v4();

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&app.token_for(owner)),
            json!({"name": "Mug", "price": "5"}),
        ))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "ACCOUNT_UNAVAILABLE");
    assert!(
        app.store
            .list(ProductFilter {
                include_deleted: true,
                ..ProductFilter::for_owner(owner)
            })
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_status_check_goes_to_users_service_with_callers_token() {
    let server = MockServer::start_async().await;
    let owner = Uuid::new_v4();
    let oracle = HttpUserStatusOracle::new(UserServiceClientConfig::new(server.base_url())).unwrap();
    let app = TestApp::with_oracle(Arc::new(oracle));
    let token = app.token_for(owner);

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/api/users/{}", owner))
                .header("authorization", format!("Bearer {}", token));
            then.status(404);
        })
        .await;

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&token),
            json!({"name": "Mug", "price": "5"}),
        ))
        .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.list(&format!("?userId={}", owner)).await.is_empty());
}

#[tokio::test]
async fn test_non_owner_update_and_delete_are_forbidden() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let product = app.create(owner, "Mug").await;
    let id = product["id"].as_str().unwrap();
    let intruder = app.token_for(Uuid::new_v4());

    let (status, body) = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}", id),
            Some(&intruder),
            json!({"price": "1.00"}),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, _) = app
        .send(
            Request::delete(format!("/api/products/{}", id))
                .header("authorization", format!("Bearer {}", intruder))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, unchanged) = app
        .send(
            Request::get(format!("/api/products/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(unchanged, product);
}

#[tokio::test]
async fn test_owner_update_and_soft_delete() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let token = app.token_for(owner);
    let product = app.create(owner, "Mug").await;
    let id = product["id"].as_str().unwrap();

    let (status, body) = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}", id),
            Some(&token),
            json!({"name": "Big Mug", "isAvailable": false}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Big Mug");
    assert_eq!(body["isAvailable"], false);

    let (status, _) = app
        .send(
            Request::delete(format!("/api/products/{}", id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(
            Request::get(format!("/api/products/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isDeleted"], true);
}

#[tokio::test]
async fn test_unknown_product_is_404_and_bad_id_is_400() {
    let app = TestApp::new();

    let (status, _) = app
        .send(
            Request::get(format!("/api/products/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(Request::get("/api/products/abc").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_UUID");
}

#[tokio::test]
async fn test_list_filters() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.create(owner, "Coffee Mug").await;
    app.create(owner, "Tea Pot").await;
    app.create(Uuid::new_v4(), "Mug Rack").await;

    assert_eq!(app.list("?searchTerm=MUG").await.len(), 2);
    assert_eq!(
        app.list(&format!("?searchTerm=mug&userId={}", owner)).await.len(),
        1
    );
    assert_eq!(app.list("?minPrice=20").await.len(), 0);
    assert_eq!(app.list("?maxPrice=19.99&isAvailable=true").await.len(), 3);
    // `%` is a literal, not a wildcard
    assert!(app.list("?searchTerm=%25").await.is_empty());
}

#[tokio::test]
async fn test_user_deleted_event_hides_products() {
    let app = TestApp::new();
    let u1 = Uuid::new_v4();
    app.create(u1, "P1").await;
    app.create(u1, "P2").await;

    let backend = Arc::new(InMemoryStreamBackend::new());
    backend
        .ensure_group(&UserLifecycleStream::stream_key(), UserLifecycleStream::QUEUE)
        .await
        .unwrap();
    let worker = StreamWorker::new(
        backend.clone(),
        Arc::new(UserLifecycleProcessor::new(app.service.coordinator())),
        WorkerConfig::from_stream_def::<UserLifecycleStream>().with_blocking(None),
    );
    StreamUserEventPublisher::new(backend.clone())
        .user_deleted(&UserDeletedEvent::new(u1))
        .await
        .unwrap();

    worker.poll_once().await.unwrap();

    assert!(app.list(&format!("?userId={}", u1)).await.is_empty());
    let with_deleted = app
        .list(&format!("?userId={}&includeDeleted=true", u1))
        .await;
    assert_eq!(with_deleted.len(), 2);
    assert!(with_deleted.iter().all(|p| p["isDeleted"] == true));
}

#[tokio::test]
async fn test_sync_user_deactivate_then_reactivate() {
    let app = TestApp::new();
    let u1 = Uuid::new_v4();
    app.create(u1, "P1").await;
    app.create(u1, "P2").await;

    let mut request = json_request(
        "POST",
        &format!("/api/products/sync-user/{}", u1),
        None,
        json!({"isActive": false}),
    );
    request
        .headers_mut()
        .insert("x-api-key", API_KEY.parse().unwrap());
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 2);
    assert!(app.list(&format!("?userId={}", u1)).await.is_empty());

    // PUT alias with an admin token
    let (status, body) = app
        .send(json_request(
            "PUT",
            &format!("/api/products/sync-user/{}", u1),
            Some(&app.admin_token()),
            json!({"isActive": true}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 2);
    assert_eq!(app.list(&format!("?userId={}", u1)).await.len(), 2);
}

#[tokio::test]
async fn test_sync_user_refuses_non_admin_tokens() {
    let app = TestApp::new();
    let victim = Uuid::new_v4();
    app.create(victim, "P1").await;
    app.create(victim, "P2").await;
    let uri = format!("/api/products/sync-user/{}", victim);

    // Neither a stranger nor the user themself may flip products
    for token in [app.token_for(Uuid::new_v4()), app.token_for(victim)] {
        let (status, body) = app
            .send(json_request("POST", &uri, Some(&token), json!({"isActive": false})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "FORBIDDEN");
    }
    assert_eq!(app.list(&format!("?userId={}", victim)).await.len(), 2);
}

#[tokio::test]
async fn test_sync_user_rejects_malformed_body_as_app_error() {
    let app = TestApp::new();
    let uri = format!("/api/products/sync-user/{}", Uuid::new_v4());

    let mut request = json_request("POST", &uri, None, json!({"isActive": "yes"}));
    request
        .headers_mut()
        .insert("x-api-key", API_KEY.parse().unwrap());
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "JSON_EXTRACTION");

    let mut request = json_request("POST", &uri, None, json!({}));
    request
        .headers_mut()
        .insert("x-api-key", API_KEY.parse().unwrap());
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "JSON_EXTRACTION");
}

#[tokio::test]
async fn test_sync_user_requires_credentials() {
    let app = TestApp::new();
    let uri = format!("/api/products/sync-user/{}", Uuid::new_v4());

    let (status, _) = app
        .send(json_request("POST", &uri, None, json!({"isActive": false})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = json_request("POST", &uri, None, json!({"isActive": false}));
    request
        .headers_mut()
        .insert("x-api-key", "wrong".parse().unwrap());
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
