use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::AppUser;
use crate::db::types::{IdentityId, ProfileId, UserRole};

const REPORT_RATE_WINDOW_SECONDS: u64 = 60;

pub(crate) struct CurrentUser(pub(crate) AppUser);
pub(crate) struct CurrentAdmin(pub(crate) AppUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let identity = Uuid::parse_str(&claims.sub)
            .map(IdentityId)
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = app_state
            .store()
            .find_user(identity)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Administrator {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

pub(crate) fn require_role(user: &AppUser, role: UserRole) -> Result<(), ApiError> {
    if user.role == role {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not enough permissions for this report"))
    }
}

/// Per-caller fixed window over every report endpoint.
pub(crate) async fn enforce_report_rate_limit(
    state: &AppState,
    user: &AppUser,
) -> Result<(), ApiError> {
    let rate_key = format!("rl:reports:{}", user.id);
    let limit = state.settings().reports().rate_limit_per_minute;
    let allowed =
        match state.redis().rate_limit(&rate_key, limit, REPORT_RATE_WINDOW_SECONDS).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    rate_limit_key = %rate_key,
                    "Failed to check report rate limit"
                );
                true
            }
        };
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many report requests, try again later"));
    }
    Ok(())
}

async fn assigned_courses(state: &AppState, teacher: IdentityId) -> Result<Vec<Uuid>, ApiError> {
    let assignments = state
        .store()
        .get_teacher_assignments(teacher)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch teacher assignments"))?;
    Ok(assignments.into_iter().map(|assignment| assignment.course_id).collect())
}

pub(crate) async fn require_course_access(
    state: &AppState,
    user: &AppUser,
    course_id: Uuid,
) -> Result<(), ApiError> {
    match user.role {
        UserRole::Administrator => Ok(()),
        UserRole::Teacher => {
            if assigned_courses(state, user.id).await?.contains(&course_id) {
                Ok(())
            } else {
                Err(ApiError::Forbidden("Not assigned to this course"))
            }
        }
        UserRole::Student | UserRole::Guardian => {
            Err(ApiError::Forbidden("Not enough permissions for this course"))
        }
    }
}

/// Administrators see every student; students see themselves, guardians
/// their linked students and teachers anyone enrolled in a course they teach.
///
/// Returns the courses the caller may see for that student; `None` means all
/// of them. Teachers only ever see the courses they are assigned to.
pub(crate) async fn require_student_access(
    state: &AppState,
    user: &AppUser,
    profile_id: ProfileId,
) -> Result<Option<Vec<Uuid>>, ApiError> {
    let store = state.store();
    let (allowed, courses) = match user.role {
        UserRole::Administrator => (true, None),
        UserRole::Student => {
            let own = store
                .get_profile_identity_map(&[profile_id])
                .await
                .map_err(|e| ApiError::internal(e, "Failed to resolve student identity"))?
                .get(&profile_id)
                .is_some_and(|identity| *identity == user.id);
            (own, None)
        }
        UserRole::Guardian => {
            let linked = store
                .get_guardian_students(user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch guardian links"))?
                .contains(&profile_id);
            (linked, None)
        }
        UserRole::Teacher => {
            let taught = assigned_courses(state, user.id).await?;
            let shared: Vec<Uuid> = store
                .get_enrollments_for_students(&[profile_id])
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch enrollments"))?
                .into_iter()
                .map(|enrollment| enrollment.course_id)
                .filter(|course_id| taught.contains(course_id))
                .collect();
            (!shared.is_empty(), Some(shared))
        }
    };

    if allowed {
        Ok(courses)
    } else {
        Err(ApiError::Forbidden("Not allowed to view this student"))
    }
}
