use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Content, Period, Subtopic, Topic};

const PERIOD_COLUMNS: &str = "id, name, number, starts_at, ends_at, subject_id";
const TOPIC_COLUMNS: &str = "id, name, period_id";
const SUBTOPIC_COLUMNS: &str = "id, name, topic_id";
const CONTENT_COLUMNS: &str = "id, title, kind, subtopic_id";

pub(crate) async fn list_periods(
    pool: &PgPool,
    subject_ids: &[Uuid],
) -> Result<Vec<Period>, sqlx::Error> {
    if subject_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Period>(&format!(
        "SELECT {PERIOD_COLUMNS} FROM periods WHERE subject_id = ANY($1) ORDER BY number, name"
    ))
    .bind(subject_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_period(pool: &PgPool, id: Uuid) -> Result<Option<Period>, sqlx::Error> {
    sqlx::query_as::<_, Period>(&format!("SELECT {PERIOD_COLUMNS} FROM periods WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_topics(
    pool: &PgPool,
    period_ids: &[Uuid],
) -> Result<Vec<Topic>, sqlx::Error> {
    if period_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Topic>(&format!(
        "SELECT {TOPIC_COLUMNS} FROM topics WHERE period_id = ANY($1) ORDER BY name, id"
    ))
    .bind(period_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_topic(pool: &PgPool, id: Uuid) -> Result<Option<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_subtopics(
    pool: &PgPool,
    topic_ids: &[Uuid],
) -> Result<Vec<Subtopic>, sqlx::Error> {
    if topic_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Subtopic>(&format!(
        "SELECT {SUBTOPIC_COLUMNS} FROM subtopics WHERE topic_id = ANY($1) ORDER BY name, id"
    ))
    .bind(topic_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_subtopic(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<Subtopic>, sqlx::Error> {
    sqlx::query_as::<_, Subtopic>(&format!(
        "SELECT {SUBTOPIC_COLUMNS} FROM subtopics WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_contents(
    pool: &PgPool,
    subtopic_ids: &[Uuid],
) -> Result<Vec<Content>, sqlx::Error> {
    if subtopic_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Content>(&format!(
        "SELECT {CONTENT_COLUMNS} FROM contents WHERE subtopic_id = ANY($1) ORDER BY title, id"
    ))
    .bind(subtopic_ids)
    .fetch_all(pool)
    .await
}
