// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, models::user::MeResponse, utils::jwt::Claims};

/// Get current user's profile and statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let me = sqlx::query_as::<_, (i64, String, String, String, serde_json::Value, bool, Option<chrono::DateTime<chrono::Utc>>, i64, i64)>(
        r#"
        SELECT
            u.id, u.username, u.email, u.role, u.profile, u.is_verified, u.created_at,
            (SELECT COUNT(*) FROM posts WHERE user_id = u.id AND deleted_at IS NULL) AS posts_count,
            (SELECT COUNT(*) FROM friendships WHERE user_id = u.id) AS friends_count
        FROM users u
        WHERE u.id = $1 AND u.deleted_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        id: me.0,
        username: me.1,
        email: me.2,
        role: me.3,
        profile: me.4,
        is_verified: me.5,
        created_at: me.6,
        posts_count: me.7,
        friends_count: me.8,
    }))
}

/// Soft-deletes the current user's account. The row survives for
/// referential integrity but is excluded from all default queries.
pub async fn delete_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let result = sqlx::query(
        "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
