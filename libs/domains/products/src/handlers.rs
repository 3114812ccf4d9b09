use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{
    AppError, BearerToken, Caller, JwtAuth, JwtClaims, ServiceAuth, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, ServiceUnavailableResponse,
        UnauthorizedResponse,
    },
    jwt_auth_middleware, service_or_user_middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::entity;
use crate::models::{
    CreateProduct, Product, ProductFilter, SyncUserRequest, SyncUserResponse, UpdateProduct,
};
use crate::repository::ProductStore;
use crate::service::ProductService;

/// OpenAPI documentation for Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        create_product,
        get_product,
        update_product,
        delete_product,
        sync_user,
    ),
    components(
        schemas(Product, CreateProduct, UpdateProduct, SyncUserRequest, SyncUserResponse),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            ServiceUnavailableResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = entity::Model::TAG, description = "Product catalog endpoints")
    )
)]
pub struct ApiDoc;

/// Create the products router.
///
/// Reads are public, owner writes need a bearer token, and `/sync-user/{userId}` also
/// accepts the service API key.
pub fn router<S: ProductStore + 'static>(
    service: ProductService<S>,
    jwt: JwtAuth,
    service_auth: ServiceAuth,
) -> Router {
    let user_auth = middleware::from_fn_with_state(jwt, jwt_auth_middleware);
    let internal_auth = middleware::from_fn_with_state(service_auth, service_or_user_middleware);

    Router::new()
        .route(
            "/",
            get(list_products).merge(post(create_product).route_layer(user_auth.clone())),
        )
        .route(
            "/{id}",
            get(get_product).merge(
                axum::routing::put(update_product)
                    .delete(delete_product)
                    .route_layer(user_auth),
            ),
        )
        .route(
            "/sync-user/{user_id}",
            post(sync_user).put(sync_user).route_layer(internal_auth),
        )
        .with_state(Arc::new(service))
}

/// List products with optional filters
#[utoipa::path(
    get,
    path = "",
    tag = entity::Model::TAG,
    params(ProductFilter),
    responses(
        (status = 200, description = "List of products", body = Vec<Product>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<S: ProductStore + 'static>(
    State(service): State<Arc<ProductService<S>>>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(service.list_products(filter).await?))
}

/// Create a product owned by the caller
#[utoipa::path(
    post,
    path = "",
    tag = entity::Model::TAG,
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn create_product<S: ProductStore + 'static>(
    State(service): State<Arc<ProductService<S>>>,
    claims: JwtClaims,
    BearerToken(token): BearerToken,
    ValidatedJson(input): ValidatedJson<CreateProduct>,
) -> Result<impl IntoResponse, AppError> {
    let product = service
        .create_product(claims.user_id()?, &token, input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product by ID (soft-deleted products included)
#[utoipa::path(
    get,
    path = "/{id}",
    tag = entity::Model::TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<S: ProductStore + 'static>(
    State(service): State<Arc<ProductService<S>>>,
    UuidPath(id): UuidPath,
) -> Result<Json<Product>, AppError> {
    Ok(Json(service.get_product(id).await?))
}

/// Update a product (owner only)
#[utoipa::path(
    put,
    path = "/{id}",
    tag = entity::Model::TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn update_product<S: ProductStore + 'static>(
    State(service): State<Arc<ProductService<S>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> Result<Json<Product>, AppError> {
    let product = service.update_product(claims.user_id()?, id, input).await?;
    Ok(Json(product))
}

/// Soft-delete a product (owner only)
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = entity::Model::TAG,
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn delete_product<S: ProductStore + 'static>(
    State(service): State<Arc<ProductService<S>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
) -> Result<StatusCode, AppError> {
    service.delete_product(claims.user_id()?, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply a user's active status to all of their products. PUT is accepted as an alias.
///
/// Callable with the service API key or an admin bearer token.
#[utoipa::path(
    post,
    path = "/sync-user/{userId}",
    tag = entity::Model::TAG,
    params(("userId" = Uuid, Path, description = "User ID")),
    request_body = SyncUserRequest,
    responses(
        (status = 200, description = "Products brought in line with the user's status", body = SyncUserResponse),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("api_key" = []), ("bearer_auth" = []))
)]
async fn sync_user<S: ProductStore + 'static>(
    State(service): State<Arc<ProductService<S>>>,
    caller: Caller,
    UuidPath(user_id): UuidPath,
    ValidatedJson(input): ValidatedJson<SyncUserRequest>,
) -> Result<Json<SyncUserResponse>, AppError> {
    match &caller {
        Caller::Service => tracing::debug!(user_id = %user_id, "Sync requested by service"),
        Caller::User(claims) if claims.is_admin() => {
            tracing::info!(user_id = %user_id, requested_by = %claims.sub, "Sync requested by admin")
        }
        Caller::User(claims) => {
            tracing::warn!(user_id = %user_id, requested_by = %claims.sub, "Sync refused for non-admin user");
            return Err(AppError::Forbidden(
                "Only services and admins can sync users".to_string(),
            ));
        }
    }
    Ok(Json(service.sync_user(user_id, input.is_active).await?))
}
