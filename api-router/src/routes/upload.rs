use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    api_state::ApiState,
    error::ApiError,
    session::{current_session_id, SessionType},
};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    // Body size is capped by the router's DefaultBodyLimit.
    #[form_data(limit = "unlimited")]
    pub file: Option<FieldData<NamedTempFile>>,
}

pub async fn upload(
    State(state): State<ApiState>,
    session: SessionType,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file = input
        .file
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    let session_id = current_session_id(&session)
        .ok_or_else(|| ApiError::BadRequest("Session not found".into()))?;

    let file_name = file.metadata.file_name.clone().unwrap_or_default();
    info!(%session_id, %file_name, "received document upload");

    // The temp file is removed on drop, on every exit path below.
    let index = state.ingestion.ingest(file.contents.path()).await?;
    state.index_store.put(&session_id, &index).await?;

    info!(%session_id, chunks = index.len(), "document indexed");

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "File uploaded and indexed successfully.",
            "session_id": session_id,
        })),
    ))
}
