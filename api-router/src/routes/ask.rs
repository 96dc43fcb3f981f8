use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    api_state::ApiState,
    error::ApiError,
    session::{current_session_id, SessionType},
};

#[derive(Debug, Deserialize)]
pub struct AskParams {
    #[serde(default)]
    pub prompt: Option<String>,
}

pub async fn ask(
    State(state): State<ApiState>,
    session: SessionType,
    payload: Result<Json<AskParams>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Malformed bodies get the same JSON error shape as pipeline rejections.
    let Json(params) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let session_id = current_session_id(&session);
    let prompt = params.prompt.unwrap_or_default();

    let answer = state
        .retrieval
        .answer(session_id.as_deref(), &prompt)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "answer": answer }))))
}
