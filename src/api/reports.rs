use axum::extract::{Path, Query, State};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{
    enforce_report_rate_limit, require_course_access, require_role, require_student_access,
    CurrentAdmin, CurrentUser,
};
use crate::core::state::AppState;
use crate::db::types::{ProfileId, UserRole};
use crate::schemas::report::{
    AdminDashboard, AlertsReport, CourseReport, GuardianPortal, ParticipationReport,
    StudentTrackingReport, TeacherDashboard,
};

#[derive(Debug, Deserialize)]
pub(crate) struct CourseReportQuery {
    #[serde(default)]
    #[serde(alias = "subjectId")]
    subject_id: Option<Uuid>,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/courses/:course_id", get(course_report))
        .route("/courses/:course_id/alerts", get(course_alerts))
        .route("/courses/:course_id/participation", get(course_participation))
        .route("/students/:profile_id", get(student_report))
}

pub(crate) fn dashboards_router() -> Router<AppState> {
    Router::new()
        .route("/teacher", get(teacher_dashboard))
        .route("/admin", get(admin_dashboard))
        .route("/guardian", get(guardian_portal))
}

async fn course_report(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Query(params): Query<CourseReportQuery>,
) -> Result<Json<CourseReport>, ApiError> {
    enforce_report_rate_limit(&state, &user).await?;
    require_course_access(&state, &user, course_id).await?;

    let report = state.engine().course_report(course_id, params.subject_id).await?;
    Ok(Json(report))
}

async fn course_alerts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<AlertsReport>, ApiError> {
    enforce_report_rate_limit(&state, &user).await?;
    require_course_access(&state, &user, course_id).await?;

    Ok(Json(state.engine().alerts_report(course_id).await?))
}

async fn course_participation(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<ParticipationReport>, ApiError> {
    enforce_report_rate_limit(&state, &user).await?;
    require_course_access(&state, &user, course_id).await?;

    Ok(Json(state.engine().participation_report(course_id).await?))
}

async fn student_report(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<StudentTrackingReport>, ApiError> {
    let profile_id = ProfileId(profile_id);
    enforce_report_rate_limit(&state, &user).await?;
    let visible_courses = require_student_access(&state, &user, profile_id).await?;

    let report = state.engine().student_report(profile_id, visible_courses.as_deref()).await?;
    Ok(Json(report))
}

async fn teacher_dashboard(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TeacherDashboard>, ApiError> {
    require_role(&user, UserRole::Teacher)?;
    enforce_report_rate_limit(&state, &user).await?;

    Ok(Json(state.engine().teacher_dashboard(user.id).await?))
}

async fn admin_dashboard(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>, ApiError> {
    enforce_report_rate_limit(&state, &admin).await?;

    Ok(Json(state.engine().admin_dashboard().await?))
}

async fn guardian_portal(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<GuardianPortal>, ApiError> {
    require_role(&user, UserRole::Guardian)?;
    enforce_report_rate_limit(&state, &user).await?;

    Ok(Json(state.engine().guardian_portal(user.id).await?))
}
