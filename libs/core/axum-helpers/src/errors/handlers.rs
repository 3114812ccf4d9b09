use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{ErrorCode, ErrorResponse};

fn render(status: StatusCode, code: ErrorCode, message: &str) -> Response {
    let body = Json(ErrorResponse {
        code: code.code(),
        error: code.as_str().to_string(),
        message: message.to_string(),
        details: None,
    });
    (status, body).into_response()
}

/// Router fallback for unknown paths.
pub async fn not_found() -> Response {
    render(
        StatusCode::NOT_FOUND,
        ErrorCode::NotFound,
        "The requested resource was not found",
    )
}
