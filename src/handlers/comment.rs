// src/handlers/comment.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        comment::{Comment, CommentResponse, CreateCommentRequest},
        notification::NewNotification,
    },
    notify,
    utils::{html::clean_html, jwt::Claims},
    visibility,
};

async fn fetch_comment_response(
    pool: &PgPool,
    viewer: i64,
    comment_id: i64,
) -> Result<CommentResponse, AppError> {
    sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.parent_id, c.created_at,
               (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS likes_count,
               EXISTS(SELECT 1 FROM comment_likes cl
                      WHERE cl.comment_id = c.id AND cl.user_id = $1) AS is_liked
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.id = $2
        "#,
    )
    .bind(viewer)
    .bind(comment_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))
}

/// Create a top-level comment on a post. Notifies the post author unless
/// they are commenting on their own post.
pub async fn create_comment(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user_id = claims.user_id();

    let author_id: i64 = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let commenter_username = sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(clean_html(&payload.content))
    .fetch_one(&pool)
    .await?;

    if author_id != user_id {
        notify::dispatch_detached(
            pool.clone(),
            config.notification_ttl_days,
            NewNotification {
                recipient_id: author_id,
                actor_id: Some(user_id),
                r#type: "comment".to_string(),
                title: format!("{} commented on your post", commenter_username),
                content: comment.content.clone(),
                related_item: Some(post_id),
                related_item_type: Some("post".to_string()),
            },
        );
    }

    let populated = fetch_comment_response(&pool, user_id, comment.id).await?;
    Ok((StatusCode::CREATED, Json(populated)))
}

/// List all comments for a post, top-level comments grouped with their
/// replies. Subject to the post's visibility.
pub async fn list_comments(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = claims.as_ref().map(|c| c.user_id());

    let post = crate::handlers::post::fetch_post(&pool, viewer.unwrap_or(0), post_id).await?;
    if !visibility::can_view_post(&pool, viewer, &post).await? {
        return Err(AppError::Forbidden(
            "You are not allowed to view this post".to_string(),
        ));
    }

    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.parent_id, c.created_at,
               (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS likes_count,
               EXISTS(SELECT 1 FROM comment_likes cl
                      WHERE cl.comment_id = c.id AND cl.user_id = $1) AS is_liked
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $2
        ORDER BY COALESCE(c.parent_id, c.id), c.created_at ASC
        "#,
    )
    .bind(viewer.unwrap_or(0))
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}

/// Reply to a comment. The reply inherits the parent's post; replying to
/// a reply attaches to the same top-level parent (one level of nesting).
pub async fn create_reply(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user_id = claims.user_id();

    let parent = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

    let replier_username = sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let top_level_parent = parent.parent_id.unwrap_or(parent.id);

    let reply = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, content, parent_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(parent.post_id)
    .bind(user_id)
    .bind(clean_html(&payload.content))
    .bind(top_level_parent)
    .fetch_one(&pool)
    .await?;

    if parent.user_id != user_id {
        notify::dispatch_detached(
            pool.clone(),
            config.notification_ttl_days,
            NewNotification {
                recipient_id: parent.user_id,
                actor_id: Some(user_id),
                r#type: "comment".to_string(),
                title: format!("{} replied to your comment", replier_username),
                content: reply.content.clone(),
                related_item: Some(parent.post_id),
                related_item_type: Some("post".to_string()),
            },
        );
    }

    let populated = fetch_comment_response(&pool, user_id, reply.id).await?;
    Ok((StatusCode::CREATED, Json(populated)))
}

/// Toggle Like on a comment. Same contract as post likes, scoped to the
/// comment's likers set.
pub async fn toggle_comment_like(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    sqlx::query_scalar::<_, i64>("SELECT user_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let mut tx = pool.begin().await?;

    let existing: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM comment_likes WHERE user_id = $1 AND comment_id = $2)",
    )
    .bind(user_id)
    .bind(comment_id)
    .fetch_one(&mut *tx)
    .await?;

    if existing {
        sqlx::query("DELETE FROM comment_likes WHERE user_id = $1 AND comment_id = $2")
            .bind(user_id)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO comment_likes (user_id, comment_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;
    }

    let likes_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1")
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;

    Ok(Json(json!({ "liked": !existing, "likes_count": likes_count })))
}

/// Delete a comment. Author or admin/super_admin. Replies survive,
/// detached from the deleted parent.
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if comment.user_id != claims.user_id() && !claims.is_moderator() {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "deleted": true })))
}
