use axum::extract::{Path, State};
use axum::{routing::post, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_access, CurrentUser};
use crate::core::state::AppState;
use crate::schemas::import::{ContentImportPreview, ContentImportRequest};
use crate::services::content_import;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/periods/:period_id/content/preview", post(preview_content))
}

async fn preview_content(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(period_id): Path<Uuid>,
    Json(payload): Json<ContentImportRequest>,
) -> Result<Json<ContentImportPreview>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let store = state.store();
    let period = store
        .find_period(period_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch period"))?
        .ok_or_else(|| ApiError::NotFound("Period not found".to_string()))?;
    let subject = store
        .find_subject(period.subject_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subject"))?
        .ok_or_else(|| ApiError::NotFound("Subject not found".to_string()))?;
    require_course_access(&state, &user, subject.course_id).await?;

    let preview = content_import::preview(store.as_ref(), period_id, &payload.rows).await?;
    Ok(Json(preview))
}
