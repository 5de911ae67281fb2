use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Course, Subject};

const COURSE_COLUMNS: &str = "id, name, level";
const SUBJECT_COLUMNS: &str = "id, name, course_id";

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses ORDER BY name, id"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Course>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ANY($1) ORDER BY name, id"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    course_id: Uuid,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(course_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_subjects(
    pool: &PgPool,
    course_ids: &[Uuid],
) -> Result<Vec<Subject>, sqlx::Error> {
    if course_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Subject>(&format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE course_id = ANY($1) ORDER BY name, id"
    ))
    .bind(course_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_subject(
    pool: &PgPool,
    subject_id: Uuid,
) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(&format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1"))
        .bind(subject_id)
        .fetch_optional(pool)
        .await
}
