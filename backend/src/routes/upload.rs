//! Image upload to the hosted image store.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Extension, Json, Router};

use memory_lane_common::{PayloadError, UploadResponse};

use crate::auth::SessionUser;
use crate::error::{ApiError, ApiResult};
use crate::images::ImageUpload;
use crate::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(Vec<u8>, Option<String>, Option<String>)>,
    memory_id: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MissingField(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::MissingField(format!("Invalid file field: {}", e)))?;
                form.file = Some((bytes.to_vec(), file_name, content_type));
            }
            Some("memoryId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::MissingField(format!("Invalid memoryId field: {}", e)))?;
                form.memory_id = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /upload - Store an image and return its public URL
async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let form = read_form(multipart).await?;

    let (bytes, file_name, content_type) = form
        .file
        .filter(|(bytes, _, _)| !bytes.is_empty())
        .ok_or(PayloadError::MissingField("file"))?;

    let memory_id = match form.memory_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| ApiError::MissingField(format!("Invalid memoryId: {}", raw)))?,
        ),
    };

    if let Some(id) = memory_id {
        if !state.store.is_owner(&user.id, id)? {
            tracing::warn!(user_id = %user.id, memory_id = id, "Rejected upload for a memory the caller does not own");
            return Err(ApiError::Unauthorized);
        }
    }

    let public_id = match memory_id {
        Some(id) => format!("memory-{}-{}", id, uuid::Uuid::new_v4()),
        None => format!("upload-{}", uuid::Uuid::new_v4()),
    };

    let url = state
        .images
        .upload(ImageUpload {
            bytes,
            file_name,
            content_type,
            public_id,
        })
        .await?;
    tracing::info!(user_id = %user.id, "Uploaded image");

    Ok(Json(UploadResponse { url }))
}

pub fn protected() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
