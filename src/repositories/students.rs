use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{IdentityLink, StudentProfile};

pub(crate) async fn list_by_ids(
    pool: &PgPool,
    profile_ids: &[Uuid],
) -> Result<Vec<StudentProfile>, sqlx::Error> {
    if profile_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, StudentProfile>(
        "SELECT id, identity_id, full_name
         FROM students
         WHERE id = ANY($1)
         ORDER BY full_name, id",
    )
    .bind(profile_ids)
    .fetch_all(pool)
    .await
}

/// Profiles without an identity link are simply absent from the result.
pub(crate) async fn list_identity_links(
    pool: &PgPool,
    profile_ids: &[Uuid],
) -> Result<Vec<IdentityLink>, sqlx::Error> {
    if profile_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, IdentityLink>(
        "SELECT id AS profile_id, identity_id
         FROM students
         WHERE id = ANY($1) AND identity_id IS NOT NULL",
    )
    .bind(profile_ids)
    .fetch_all(pool)
    .await
}
