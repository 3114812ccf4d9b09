use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_helpers::{
    AppError, JwtAuth, JwtClaims, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, ServiceUnavailableResponse,
        UnauthorizedResponse,
    },
    jwt_auth_middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::models::{
    ChangePasswordRequest, ConfirmEmailRequest, ForgotPasswordRequest, LoginRequest,
    LoginResponse, RegisterRequest, ResetPasswordRequest, Role, SetStatusRequest,
    UpdateUserRequest, UserFilter, UserResponse,
};
use crate::repository::UserRepository;
use crate::service::{Actor, UserService};

pub const AUTH_TAG: &str = "auth";
pub const USERS_TAG: &str = "users";

/// OpenAPI documentation for the account endpoints (`/api/auth`)
#[derive(OpenApi)]
#[openapi(
    paths(register, login, confirm_email, forgot_password, reset_password),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ConfirmEmailRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            UserResponse,
            Role
        ),
        responses(
            BadRequestValidationResponse,
            UnauthorizedResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = AUTH_TAG, description = "Registration, login and password recovery"))
)]
pub struct AuthApiDoc;

/// OpenAPI documentation for user management (`/api/users`)
#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        get_user,
        update_user,
        delete_user,
        set_status,
        restore_user,
        change_password
    ),
    components(
        schemas(UserResponse, UpdateUserRequest, SetStatusRequest, ChangePasswordRequest, Role),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            ConflictResponse,
            ServiceUnavailableResponse,
            InternalServerErrorResponse
        )
    ),
    tags((name = USERS_TAG, description = "User management endpoints"))
)]
pub struct UsersApiDoc;

/// Public account routes, no token required.
pub fn auth_router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/confirm-email", post(confirm_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .with_state(Arc::new(service))
}

/// User management routes, every one behind a bearer token.
pub fn users_router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let jwt: JwtAuth = service.jwt().clone();

    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/status", put(set_status))
        .route("/{id}/restore", post(restore_user))
        .route("/{id}/change-password", post(change_password))
        .route_layer(middleware::from_fn_with_state(jwt, jwt_auth_middleware))
        .with_state(Arc::new(service))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = AUTH_TAG,
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, confirmation pending", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn register<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = service.register(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/login",
    tag = AUTH_TAG,
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn login<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(service.login(input).await?))
}

#[utoipa::path(
    post,
    path = "/confirm-email",
    tag = AUTH_TAG,
    request_body = ConfirmEmailRequest,
    responses(
        (status = 204, description = "Email confirmed"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn confirm_email<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<ConfirmEmailRequest>,
) -> Result<StatusCode, AppError> {
    service.confirm_email(input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request a reset link. Responds 204 whether or not the email is known.
#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = AUTH_TAG,
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Reset link sent if the account exists"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn forgot_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    service.forgot_password(input).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/reset-password",
    tag = AUTH_TAG,
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn reset_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    service.reset_password(input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List users (admin)
#[utoipa::path(
    get,
    path = "",
    tag = USERS_TAG,
    params(UserFilter),
    responses(
        (status = 200, description = "Non-deleted users", body = Vec<UserResponse>),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let actor = Actor::try_from(&claims)?;
    Ok(Json(service.list_users(actor, filter).await?))
}

/// Get a user by ID (self or admin)
#[utoipa::path(
    get,
    path = "/{id}",
    tag = USERS_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
) -> Result<Json<UserResponse>, AppError> {
    let actor = Actor::try_from(&claims)?;
    Ok(Json(service.get_user(actor, id).await?))
}

/// Update profile fields (self or admin, confirmed email required)
#[utoipa::path(
    put,
    path = "/{id}",
    tag = USERS_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let actor = Actor::try_from(&claims)?;
    Ok(Json(service.update_user(actor, id, input).await?))
}

/// Soft-delete a user and announce it to dependent services
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = USERS_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
) -> Result<StatusCode, AppError> {
    let actor = Actor::try_from(&claims)?;
    service.delete_user(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Activate or deactivate a user (admin)
#[utoipa::path(
    put,
    path = "/{id}/status",
    tag = USERS_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 204, description = "Status applied"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn set_status<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
    Json(input): Json<SetStatusRequest>,
) -> Result<StatusCode, AppError> {
    let actor = Actor::try_from(&claims)?;
    service.set_status(actor, id, input.is_active).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Undo a soft delete (admin)
#[utoipa::path(
    post,
    path = "/{id}/restore",
    tag = USERS_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User restored"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn restore_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
) -> Result<StatusCode, AppError> {
    let actor = Actor::try_from(&claims)?;
    service.restore_user(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/change-password",
    tag = USERS_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn change_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    claims: JwtClaims,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let actor = Actor::try_from(&claims)?;
    service.change_password(actor, id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}
