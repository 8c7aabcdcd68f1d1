//! User profile endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};

use memory_lane_common::{
    MemoriesResponse, MessageResponse, PayloadError, UpdateBioRequest, UserResponse,
};

use super::memories::entries;
use crate::auth::cookies::{clear_cookie, SESSION_COOKIE};
use crate::auth::{current_user, SessionUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /users/:uid - Public profile
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.store.get_user(&uid)?.ok_or(ApiError::NotFound("User"))?;

    Ok(Json(UserResponse {
        user: user.public_profile(),
    }))
}

/// GET /users/:uid/memories - One author's memories, newest first
async fn get_user_memories(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<MemoriesResponse>> {
    let viewer = current_user(&state, &headers).await;
    let memories = entries(state.store.list_memories_for_user(&uid)?);

    Ok(Json(MemoriesResponse {
        memories,
        viewer_id: viewer.map(|u| u.id),
    }))
}

/// PUT /users - Set the caller's bio
async fn update_bio(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateBioRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let bio = request.bio.ok_or(PayloadError::MissingField("bio"))?;

    state.store.upsert_user(&user.to_user())?;
    state.store.update_bio(&user.id, &bio)?;
    tracing::info!(user_id = %user.id, "Updated bio");

    Ok(Json(MessageResponse::new("User updated successfully")))
}

/// DELETE /users - Remove the caller and everything they wrote
async fn delete_self(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> ApiResult<impl IntoResponse> {
    let existed = state.store.delete_user(&user.id)?;
    tracing::info!(user_id = %user.id, existed, "Deleted user");

    Ok((
        [(SET_COOKIE, clear_cookie(SESSION_COOKIE))],
        Json(MessageResponse::new("User deleted successfully")),
    ))
}

pub fn public() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:uid", get(get_user))
        .route("/users/:uid/memories", get(get_user_memories))
}

pub fn protected() -> Router<Arc<AppState>> {
    Router::new().route("/users", put(update_bio).delete(delete_self))
}
