use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller does not own the product
    #[error("Access denied")]
    Forbidden,

    /// Owner is inactive, deleted, or could not be confirmed active
    #[error("User account unavailable: {0}")]
    AccountUnavailable(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The users service could not be reached in time
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(id) => AppError::NotFound(format!("Product {} not found", id)),
            ProductError::Unauthorized(msg) => AppError::Unauthorized(msg),
            ProductError::Forbidden => AppError::Forbidden("Access denied".to_string()),
            ProductError::AccountUnavailable(msg) => AppError::AccountUnavailable(msg),
            ProductError::Validation(msg) => AppError::BadRequest(msg),
            ProductError::UpstreamUnavailable(msg) => AppError::ServiceUnavailable(msg),
            ProductError::Database(msg) => AppError::InternalServerError(msg),
            ProductError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<sea_orm::DbErr> for ProductError {
    fn from(err: sea_orm::DbErr) -> Self {
        ProductError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ProductError {
    fn from(err: validator::ValidationErrors) -> Self {
        ProductError::Validation(err.to_string())
    }
}

impl ProductError {
    /// Whether a stream consumer should retry the operation that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProductError::Database(_) | ProductError::UpstreamUnavailable(_) | ProductError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_helpers::ErrorCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ProductError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (ProductError::Unauthorized("no token".into()), StatusCode::UNAUTHORIZED),
            (ProductError::Forbidden, StatusCode::FORBIDDEN),
            (ProductError::AccountUnavailable("inactive".into()), StatusCode::FORBIDDEN),
            (ProductError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ProductError::UpstreamUnavailable("timeout".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ProductError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ProductError::Internal("bug".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_account_unavailable_has_own_code() {
        let app: AppError = ProductError::AccountUnavailable("inactive".into()).into();
        assert_eq!(app.error_code(), ErrorCode::AccountUnavailable);
    }
}
