use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::AppUser;

pub(crate) async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<AppUser>, sqlx::Error> {
    sqlx::query_as::<_, AppUser>("SELECT id, full_name, role, is_active FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
