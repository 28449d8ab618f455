use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::dto::{MessageResponse, PublicUser},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/users", post(create_user).get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// Request body that must be a non-empty JSON object.
pub struct JsonObject(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| {
                debug!(error = %rejection, "unreadable json body");
                ApiError::NoInput
            })?;
        match value {
            Value::Object(map) if !map.is_empty() => Ok(JsonObject(map)),
            _ => Err(ApiError::NoInput),
        }
    }
}

/// Integer user id from the path. Anything else does not match the route.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::RouteNotFound)?;
        raw.parse::<i64>()
            .map(UserId)
            .map_err(|_| ApiError::RouteNotFound)
    }
}

pub async fn home() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the user control API!"))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonObject(payload): JsonObject,
) -> ApiResult<impl IntoResponse> {
    let user = state.users.create_user(&payload).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/users/{}", user.id))],
        Json(MessageResponse::new("User created successfully")),
    ))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<PublicUser>>> {
    Ok(Json(state.users.list_users().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    UserId(id): UserId,
) -> ApiResult<Json<PublicUser>> {
    Ok(Json(state.users.get_user(id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    UserId(id): UserId,
    JsonObject(payload): JsonObject,
) -> ApiResult<Json<MessageResponse>> {
    state.users.update_user(id, &payload).await?;
    Ok(Json(MessageResponse::new("User updated successfully")))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    UserId(id): UserId,
) -> ApiResult<Json<MessageResponse>> {
    state.users.delete_user(id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
