use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo::USER_COLUMNS;
use crate::auth::repo_types::User;
use crate::users::dto::UpdateMeRequest;

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn update_profile(
    db: &PgPool,
    id: Uuid,
    changes: &UpdateMeRequest,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
         first_name = COALESCE($2, first_name), \
         last_name = COALESCE($3, last_name), \
         avatar = COALESCE($4, avatar), \
         phone_number = COALESCE($5, phone_number), \
         updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(&changes.avatar)
    .bind(&changes.phone_number)
    .fetch_one(db)
    .await
}

/// Soft-deactivate; records are never hard-deleted. Returns false when no
/// such user exists.
pub async fn deactivate(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE users SET active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
