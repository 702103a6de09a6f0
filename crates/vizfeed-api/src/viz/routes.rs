use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use vizfeed_types::viz::{MountRequest, VizSessionSnapshot, VizSignal};

use super::registry::RegistryError;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownSession(_) => ApiError::NotFound("Viz session"),
            RegistryError::Illegal(e) => ApiError::Conflict(e.to_string()),
        }
    }
}

pub async fn mount_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MountRequest>,
) -> ApiResult<impl IntoResponse> {
    let post_id = req.post_id.to_string();
    state
        .db(move |db| db.get_post(&post_id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    let (session_id, _cancel) = state.viz.mount(req.post_id).await;
    let snapshot = state
        .viz
        .snapshot(session_id)
        .await
        .ok_or(ApiError::NotFound("Viz session"))?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_session(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> ApiResult<Json<VizSessionSnapshot>> {
    state
        .viz
        .snapshot(session_id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound("Viz session"))
}

pub async fn report_event(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
    ApiJson(signal): ApiJson<VizSignal>,
) -> ApiResult<Json<VizSessionSnapshot>> {
    Ok(Json(state.viz.report(session_id, &signal).await?))
}

pub async fn unmount_session(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> ApiResult<Json<VizSessionSnapshot>> {
    Ok(Json(state.viz.unmount(session_id).await?))
}
