use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;
use tdp::database::entities::restore_tasks;
use tdp::errors::CoreError;
use tdp::services::ProgressEvent;
use tracing::{debug, info};

use super::{actor_from_headers, ApiError};
use crate::server::app::AppState;

/// Multipart field carrying the uploaded archive
pub const ARCHIVE_FIELD: &str = "archive";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRestoreResponse {
    pub task_id: String,
}

pub async fn export_archive(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers);
    let file = state.ctx.export_service().export(&actor).await?;

    info!(
        "Serving export {} ({} collections, {} media files)",
        file.filename,
        file.summary.collections.len(),
        file.summary.media_files
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    ))
}

pub async fn submit_restore(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers);

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(ARCHIVE_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| CoreError::validation(format!("Could not read upload: {}", e)))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        CoreError::validation(format!("Multipart field '{}' is required", ARCHIVE_FIELD))
    })?;

    let task_id = state
        .ctx
        .restore_service()
        .submit(&actor, &filename, bytes)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitRestoreResponse { task_id }),
    ))
}

pub async fn list_restores(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<restore_tasks::Model>>, ApiError> {
    let actor = actor_from_headers(&headers);
    let tasks = state.ctx.restore_service().list_tasks(&actor).await?;
    Ok(Json(tasks))
}

pub async fn get_restore(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ProgressEvent>, ApiError> {
    let actor = actor_from_headers(&headers);
    let snapshot = state.ctx.restore_service().snapshot(&actor, &task_id).await?;
    Ok(Json(snapshot))
}

pub async fn cancel_restore(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers);
    let service = state.ctx.restore_service();
    let running = service.is_running(&task_id).await;
    let task = service.cancel(&actor, &task_id).await?;

    Ok(Json(json!({
        "task": ProgressEvent::from_task(&task),
        "cancellationRequested": running,
    })))
}
