// src/handlers/message.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    live::{LiveEvent, LiveHub},
    models::{
        message::{ConversationSummary, Message, SendMessageRequest, UpdateMessageRequest},
        notification::NewNotification,
    },
    notify,
    storage::MediaStore,
    utils::{html::clean_html, jwt::Claims},
};

/// Send a direct message. Persists first; notification and live delivery
/// are best-effort side effects that never change the response.
pub async fn send_message(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(hub): State<LiveHub>,
    Extension(claims): Extension<Claims>,
    Path(receiver_id): Path<i64>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !payload.has_body() {
        return Err(AppError::BadRequest(
            "A message needs text or an image".to_string(),
        ));
    }

    let sender_id = claims.user_id();

    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(receiver_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Receiver not found".to_string()))?;

    let sender_username = sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE id = $1",
    )
    .bind(sender_id)
    .fetch_one(&pool)
    .await?;

    let content = clean_html(payload.content.as_deref().unwrap_or(""));

    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (sender_id, receiver_id, content, image_url, image_storage_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(sender_id)
    .bind(receiver_id)
    .bind(&content)
    .bind(&payload.image_url)
    .bind(&payload.image_storage_id)
    .fetch_one(&pool)
    .await?;

    notify::dispatch_detached(
        pool.clone(),
        config.notification_ttl_days,
        NewNotification {
            recipient_id: receiver_id,
            actor_id: Some(sender_id),
            r#type: "message".to_string(),
            title: format!("New message from {}", sender_username),
            content: String::new(),
            related_item: Some(message.id),
            related_item_type: Some("message".to_string()),
        },
    );

    // Live push to both ends. No open connection, no event; nothing is
    // queued for later delivery.
    let event = LiveEvent::new("new_message", serde_json::to_value(&message)?);
    let hub_clone = hub.clone();
    tokio::spawn(async move {
        hub_clone.send_to_user(receiver_id, &event).await;
        hub_clone.send_to_user(sender_id, &event).await;
    });

    Ok((StatusCode::CREATED, Json(message)))
}

/// Fetch the thread with another user, oldest first. As a side effect,
/// everything they sent the caller is marked read.
pub async fn fetch_thread(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(other_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE (sender_id = $1 AND receiver_id = $2)
           OR (sender_id = $2 AND receiver_id = $1)
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .bind(other_id)
    .fetch_all(&pool)
    .await?;

    sqlx::query(
        r#"
        UPDATE messages SET is_read = TRUE
        WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
        "#,
    )
    .bind(other_id)
    .bind(user_id)
    .execute(&pool)
    .await?;

    Ok(Json(messages))
}

/// Conversation overview: one row per partner with the latest message and
/// the caller's unread count.
pub async fn list_conversations(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let conversations = sqlx::query_as::<_, ConversationSummary>(
        r#"
        SELECT u.id AS user_id, u.username, u.role,
               m.content AS last_content, m.created_at AS last_at,
               (SELECT COUNT(*) FROM messages
                WHERE sender_id = u.id AND receiver_id = $1 AND is_read = FALSE) AS unread_count
        FROM (
            SELECT DISTINCT ON (partner_id) *
            FROM (
                SELECT *,
                       CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
            ) latest
            ORDER BY partner_id, created_at DESC
        ) m
        JOIN users u ON m.partner_id = u.id AND u.deleted_at IS NULL
        ORDER BY m.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(conversations))
}

/// Edit a message. Sender only.
pub async fn update_message(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Message not found".to_string()))?;

    if message.sender_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "Only the sender can edit this message".to_string(),
        ));
    }

    if payload.content.is_none() && payload.image_url.is_none() {
        return Ok(Json(message));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE messages SET ");
    let mut separated = builder.separated(", ");

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(image_url) = payload.image_url {
        separated.push("image_url = ");
        separated.push_bind_unseparated(image_url);
        separated.push("image_storage_id = ");
        separated.push_bind_unseparated(payload.image_storage_id);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");

    let updated = builder
        .build_query_as::<Message>()
        .fetch_one(&pool)
        .await?;

    Ok(Json(updated))
}

/// Delete a message. Sender only. An attached stored image is removed
/// best-effort; its failure is logged and the deletion proceeds.
pub async fn delete_message(
    State(pool): State<PgPool>,
    State(media_store): State<Arc<dyn MediaStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Message not found".to_string()))?;

    if message.sender_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "Only the sender can delete this message".to_string(),
        ));
    }

    if let Some(storage_id) = &message.image_storage_id {
        if let Err(e) = media_store.delete(storage_id).await {
            tracing::warn!("failed to delete image {} of message {}: {}", storage_id, id, e);
        }
    }

    sqlx::query("DELETE FROM messages WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "deleted": true })))
}
