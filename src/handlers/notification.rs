// src/handlers/notification.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{error::AppError, models::notification::Notification, utils::jwt::Claims};

/// Last 50 notifications for the caller, newest first. Expired rows are
/// filtered out even if the purge task has not swept them yet.
pub async fn list_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT n.*, u.username AS actor_username, u.role AS actor_role
        FROM notifications n
        LEFT JOIN users u ON n.actor_id = u.id
        WHERE n.recipient_id = $1 AND n.expires_at > NOW()
        ORDER BY n.created_at DESC
        LIMIT 50
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(notifications))
}

/// Count of unread, unexpired notifications for the caller.
pub async fn unread_count(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let unread: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE recipient_id = $1 AND is_read = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(claims.user_id())
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({ "unread": unread })))
}

/// Mark one notification as read. Recipient only.
pub async fn mark_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let recipient_id: i64 =
        sqlx::query_scalar("SELECT recipient_id FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Notification not found".to_string()))?;

    if recipient_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "This notification belongs to another user".to_string(),
        ));
    }

    let notification = sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications
        SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(notification))
}

/// Mark all of the caller's notifications as read.
pub async fn mark_all_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
        WHERE recipient_id = $1 AND is_read = FALSE
        "#,
    )
    .bind(claims.user_id())
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "updated": result.rows_affected() })))
}

/// Delete one notification, or every notification of the caller when the
/// path id is the literal token "all".
pub async fn delete_notification(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    if id == "all" {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(user_id)
            .execute(&pool)
            .await?;

        return Ok(Json(json!({ "deleted": result.rows_affected() })));
    }

    let id: i64 = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid notification id '{}'", id)))?;

    let recipient_id: i64 =
        sqlx::query_scalar("SELECT recipient_id FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Notification not found".to_string()))?;

    if recipient_id != user_id {
        return Err(AppError::Forbidden(
            "This notification belongs to another user".to_string(),
        ));
    }

    sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "deleted": 1 })))
}
