use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Evaluation, Quiz};
use crate::db::relation::{EvaluationChain, QuizChain};

const QUIZ_COLUMNS: &str = "id, name, subtopic_id, opens_at, closes_at, is_active";
const EVALUATION_COLUMNS: &str = "id, name, period_id, subject_id, opens_at, closes_at";

// Subject → course embed, shared by both chain queries. `s` aliases the subjects row.
const SUBJECT_EMBED: &str = "json_build_object(
    'id', s.id, 'name', s.name, 'course_id', s.course_id,
    'course', (SELECT json_build_object('id', c.id, 'name', c.name, 'level', c.level)
               FROM courses c WHERE c.id = s.course_id))";

fn period_embed() -> String {
    format!(
        "json_build_object(
            'id', p.id, 'name', p.name, 'number', p.number,
            'starts_at', p.starts_at, 'ends_at', p.ends_at, 'subject_id', p.subject_id,
            'subject', (SELECT {SUBJECT_EMBED} FROM subjects s WHERE s.id = p.subject_id))"
    )
}

pub(crate) async fn list_quizzes(
    pool: &PgPool,
    subtopic_ids: &[Uuid],
) -> Result<Vec<Quiz>, sqlx::Error> {
    if subtopic_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE subtopic_id = ANY($1) ORDER BY name, id"
    ))
    .bind(subtopic_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_quizzes_by_ids(
    pool: &PgPool,
    quiz_ids: &[Uuid],
) -> Result<Vec<Quiz>, sqlx::Error> {
    if quiz_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ANY($1)"))
        .bind(quiz_ids)
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_evaluations(
    pool: &PgPool,
    period_ids: &[Uuid],
    subject_ids: &[Uuid],
) -> Result<Vec<Evaluation>, sqlx::Error> {
    if period_ids.is_empty() && subject_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Evaluation>(&format!(
        "SELECT {EVALUATION_COLUMNS}
         FROM evaluations
         WHERE period_id = ANY($1) OR subject_id = ANY($2)
         ORDER BY name, id"
    ))
    .bind(period_ids)
    .bind(subject_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_evaluations_by_ids(
    pool: &PgPool,
    evaluation_ids: &[Uuid],
) -> Result<Vec<Evaluation>, sqlx::Error> {
    if evaluation_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Evaluation>(&format!(
        "SELECT {EVALUATION_COLUMNS} FROM evaluations WHERE id = ANY($1)"
    ))
    .bind(evaluation_ids)
    .fetch_all(pool)
    .await
}

/// Topic is aggregated with `json_agg`, so it arrives as an array.
pub(crate) async fn quiz_chains(
    pool: &PgPool,
    quiz_ids: &[Uuid],
) -> Result<Vec<QuizChain>, sqlx::Error> {
    if quiz_ids.is_empty() {
        return Ok(Vec::new());
    }

    let period = period_embed();
    let rows = sqlx::query_scalar::<_, Json<QuizChain>>(&format!(
        "SELECT json_build_object(
            'id', q.id, 'name', q.name, 'subtopic_id', q.subtopic_id,
            'subtopic', (
                SELECT json_build_object(
                    'id', st.id, 'name', st.name, 'topic_id', st.topic_id,
                    'topic', (
                        SELECT json_agg(json_build_object(
                            'id', t.id, 'name', t.name, 'period_id', t.period_id,
                            'period', (SELECT {period} FROM periods p WHERE p.id = t.period_id)))
                        FROM topics t WHERE t.id = st.topic_id))
                FROM subtopics st WHERE st.id = q.subtopic_id))
         FROM quizzes q
         WHERE q.id = ANY($1)"
    ))
    .bind(quiz_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|Json(chain)| chain).collect())
}

pub(crate) async fn evaluation_chains(
    pool: &PgPool,
    evaluation_ids: &[Uuid],
) -> Result<Vec<EvaluationChain>, sqlx::Error> {
    if evaluation_ids.is_empty() {
        return Ok(Vec::new());
    }

    let period = period_embed();
    let rows = sqlx::query_scalar::<_, Json<EvaluationChain>>(&format!(
        "SELECT json_build_object(
            'id', e.id, 'name', e.name, 'period_id', e.period_id, 'subject_id', e.subject_id,
            'period', (SELECT {period} FROM periods p WHERE p.id = e.period_id),
            'subject', (SELECT {SUBJECT_EMBED} FROM subjects s WHERE s.id = e.subject_id))
         FROM evaluations e
         WHERE e.id = ANY($1)"
    ))
    .bind(evaluation_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|Json(chain)| chain).collect())
}
