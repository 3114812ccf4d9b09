use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Users API",
        version = "0.1.0",
        description = "User accounts, authentication and lifecycle events",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8081", description = "Local development server")
    ),
    nest(
        (path = "/api/auth", api = domain_users::handlers::AuthApiDoc),
        (path = "/api/users", api = domain_users::handlers::UsersApiDoc)
    )
)]
pub struct ApiDoc;
