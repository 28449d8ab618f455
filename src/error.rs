use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;
use crate::users::services::UserError;

pub const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Errors surfaced by the HTTP layer.
///
/// `IntoResponse` below is the only place error kinds become status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error("no input data provided")]
    NoInput,

    #[error("route not found")]
    RouteNotFound,

    #[error("method not allowed")]
    MethodNotAllowed(Option<HeaderValue>),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::User(UserError::Validation(errors)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid input",
                    "fields": errors.errors(),
                })),
            )
                .into_response(),
            ApiError::User(UserError::DuplicateEmail(_)) => {
                error_body(StatusCode::BAD_REQUEST, "Email already exists")
            }
            ApiError::User(UserError::NotFound(_)) => {
                error_body(StatusCode::NOT_FOUND, "User not found")
            }
            ApiError::User(e @ (UserError::Store(_) | UserError::Hash(_))) => {
                if let UserError::Store(StoreError::Database(db)) = &e {
                    error!(error = %db, debug = ?db, "store failure");
                } else {
                    error!(error = %e, "internal failure");
                }
                error_body(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
            ApiError::NoInput => error_body(StatusCode::BAD_REQUEST, "No input data provided"),
            ApiError::RouteNotFound => error_body(StatusCode::NOT_FOUND, "Not Found"),
            ApiError::MethodNotAllowed(allow) => {
                let mut res = error_body(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                if let Some(allow) = allow {
                    res.headers_mut().insert(header::ALLOW, allow);
                }
                res
            }
        }
    }
}

pub fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_status() {
        let cases = [
            (
                ApiError::from(UserError::DuplicateEmail("a@b.c".into())),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(UserError::NotFound(3)), StatusCode::NOT_FOUND),
            (
                ApiError::from(UserError::Store(StoreError::Database(sqlx::Error::PoolTimedOut))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(UserError::Hash("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::NoInput, StatusCode::BAD_REQUEST),
            (ApiError::RouteNotFound, StatusCode::NOT_FOUND),
            (ApiError::MethodNotAllowed(None), StatusCode::METHOD_NOT_ALLOWED),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn method_not_allowed_keeps_allow_header() {
        let allow = HeaderValue::from_static("GET,HEAD");
        let res = ApiError::MethodNotAllowed(Some(allow)).into_response();
        assert_eq!(res.headers().get(header::ALLOW).unwrap(), "GET,HEAD");
    }
}
