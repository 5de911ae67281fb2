use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::AttemptRow;

pub(crate) async fn list_quiz_attempts(
    pool: &PgPool,
    identity_ids: &[Uuid],
    quiz_ids: &[Uuid],
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    if identity_ids.is_empty() || quiz_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, AttemptRow>(
        "SELECT id, quiz_id AS assessment_id, student_id, grade, completed, started_at, finished_at
         FROM quiz_attempts
         WHERE student_id = ANY($1) AND quiz_id = ANY($2)
         ORDER BY started_at NULLS FIRST, id",
    )
    .bind(identity_ids)
    .bind(quiz_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_evaluation_attempts(
    pool: &PgPool,
    identity_ids: &[Uuid],
    evaluation_ids: &[Uuid],
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    if identity_ids.is_empty() || evaluation_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, AttemptRow>(
        "SELECT id, evaluation_id AS assessment_id, student_id, grade, completed,
                started_at, finished_at
         FROM evaluation_attempts
         WHERE student_id = ANY($1) AND evaluation_id = ANY($2)
         ORDER BY started_at NULLS FIRST, id",
    )
    .bind(identity_ids)
    .bind(evaluation_ids)
    .fetch_all(pool)
    .await
}
