use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Enrollment, TeacherAssignment};
use crate::db::types::ProfileId;

pub(crate) async fn list_by_courses(
    pool: &PgPool,
    course_ids: &[Uuid],
) -> Result<Vec<Enrollment>, sqlx::Error> {
    if course_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Enrollment>(
        "SELECT student_id, course_id
         FROM enrollments
         WHERE course_id = ANY($1)
         ORDER BY course_id, student_id",
    )
    .bind(course_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_students(
    pool: &PgPool,
    profile_ids: &[Uuid],
) -> Result<Vec<Enrollment>, sqlx::Error> {
    if profile_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Enrollment>(
        "SELECT student_id, course_id
         FROM enrollments
         WHERE student_id = ANY($1)
         ORDER BY student_id, course_id",
    )
    .bind(profile_ids)
    .fetch_all(pool)
    .await
}

/// Assignments for the teacher whose authentication identity is `identity_id`.
pub(crate) async fn list_teacher_assignments(
    pool: &PgPool,
    identity_id: Uuid,
) -> Result<Vec<TeacherAssignment>, sqlx::Error> {
    sqlx::query_as::<_, TeacherAssignment>(
        "SELECT ta.teacher_id, ta.course_id
         FROM teacher_assignments ta
         JOIN teachers t ON t.id = ta.teacher_id
         WHERE t.identity_id = $1
         ORDER BY ta.course_id",
    )
    .bind(identity_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_guardian_students(
    pool: &PgPool,
    guardian_identity_id: Uuid,
) -> Result<Vec<ProfileId>, sqlx::Error> {
    sqlx::query_scalar::<_, ProfileId>(
        "SELECT student_id
         FROM guardian_students
         WHERE guardian_id = $1
         ORDER BY student_id",
    )
    .bind(guardian_identity_id)
    .fetch_all(pool)
    .await
}
