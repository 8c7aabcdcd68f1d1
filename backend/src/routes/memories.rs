//! Memory feed and single-memory endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Extension, Json, Router};

use memory_lane_common::{
    MemoriesResponse, MemoryEntry, MemoryPayload, MemoryResponse, MessageResponse,
};

use crate::auth::{current_user, SessionUser};
use crate::error::{ApiError, ApiResult};
use crate::models::{MemoryFields, MemoryWithAuthor};
use crate::AppState;

pub(crate) fn entries(rows: Vec<MemoryWithAuthor>) -> Vec<MemoryEntry> {
    rows.into_iter().map(MemoryWithAuthor::into_entry).collect()
}

fn fields(payload: MemoryPayload) -> ApiResult<MemoryFields> {
    let valid = payload.validate()?;
    Ok(MemoryFields::try_from(valid)?)
}

/// 401 unless `user` wrote the memory. Runs before any mutation.
fn ensure_owner(state: &AppState, user: &SessionUser, memory_id: i64) -> ApiResult<()> {
    if state.store.is_owner(&user.id, memory_id)? {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %user.id,
            memory_id,
            "Rejected change to a memory the caller does not own"
        );
        Err(ApiError::Unauthorized)
    }
}

/// GET /memories - Every memory, newest first
async fn list_memories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<MemoriesResponse>> {
    let viewer = current_user(&state, &headers).await;
    let memories = entries(state.store.list_memories()?);

    Ok(Json(MemoriesResponse {
        memories,
        viewer_id: viewer.map(|u| u.id),
    }))
}

/// POST /memories - Create a memory authored by the caller
async fn create_memory(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Json(payload): Json<MemoryPayload>,
) -> ApiResult<(StatusCode, Json<MemoryResponse>)> {
    let fields = fields(payload)?;

    state.store.upsert_user(&user.to_user())?;
    let memory = state.store.create_memory(&user.id, &fields)?;
    tracing::info!(user_id = %user.id, memory_id = memory.id, "Created memory");

    Ok((
        StatusCode::CREATED,
        Json(MemoryResponse {
            memory: memory.to_wire(),
        }),
    ))
}

/// GET /memories/:id
async fn get_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MemoryResponse>> {
    let memory = state
        .store
        .get_memory(id)?
        .ok_or(ApiError::NotFound("Memory"))?;

    Ok(Json(MemoryResponse {
        memory: memory.to_wire(),
    }))
}

/// PUT /memories/:id - Owner-only update
async fn update_memory(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i64>,
    Json(payload): Json<MemoryPayload>,
) -> ApiResult<Json<MessageResponse>> {
    ensure_owner(&state, &user, id)?;
    let fields = fields(payload)?;

    if !state.store.update_memory(id, &fields)? {
        return Err(ApiError::NotFound("Memory"));
    }
    tracing::info!(user_id = %user.id, memory_id = id, "Updated memory");

    Ok(Json(MessageResponse::new("Memory updated successfully")))
}

/// DELETE /memories/:id - Owner-only delete
async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    ensure_owner(&state, &user, id)?;

    if !state.store.delete_memory(id)? {
        return Err(ApiError::NotFound("Memory"));
    }
    tracing::info!(user_id = %user.id, memory_id = id, "Deleted memory");

    Ok(Json(MessageResponse::new("Memory deleted successfully")))
}

pub fn public() -> Router<Arc<AppState>> {
    Router::new().route("/memories", get(list_memories))
}

pub fn protected() -> Router<Arc<AppState>> {
    Router::new()
        .route("/memories", axum::routing::post(create_memory))
        .route(
            "/memories/:id",
            get(get_memory).put(update_memory).delete(delete_memory),
        )
}
