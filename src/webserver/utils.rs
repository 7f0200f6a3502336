/// Response helpers shared by route handlers
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
}

/// 200 with a JSON body
pub fn success_response<T: Serialize>(data: T) -> Response {
    Json(data).into_response()
}

/// Error status with `{"error": ..., "code": ...}`
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message,
            code,
        }),
    )
        .into_response()
}
