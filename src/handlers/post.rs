// src/handlers/post.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
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
    models::{
        notification::NewNotification,
        post::{CreatePostRequest, FeedParams, FeedResponse, Pagination, Post, UpdatePostRequest},
    },
    notify,
    storage::MediaStore,
    utils::{html::clean_html, jwt::Claims},
    visibility,
};

/// Derived columns attached to every post the API returns. `$1` is the
/// viewer id (0 for anonymous, which matches no rows).
const POST_COLUMNS: &str = r#"
    p.id, p.user_id, p.content, p.visibility, p.media, p.shares_count,
    p.created_at, p.updated_at,
    (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id) AS likes_count,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count,
    (SELECT COUNT(*) FROM post_bookmarks pb WHERE pb.post_id = p.id) AS bookmarks_count,
    EXISTS(SELECT 1 FROM post_likes pl WHERE pl.post_id = p.id AND pl.user_id = $1) AS is_liked,
    EXISTS(SELECT 1 FROM post_bookmarks pb WHERE pb.post_id = p.id AND pb.user_id = $1) AS is_bookmarked
"#;

/// Visibility filter for listing: public posts, the viewer's own posts,
/// and connections-posts by authors with an accepted edge to the viewer.
/// The edge test goes against friend_requests directly, not the mirrored
/// friendship rows.
const FEED_VISIBILITY_WHERE: &str = r#"
    u.deleted_at IS NULL
    AND (
        p.visibility = 'public'
        OR p.user_id = $1
        OR (p.visibility = 'connections' AND EXISTS(
            SELECT 1 FROM friend_requests fr
            WHERE fr.status = 'accepted'
              AND ((fr.sender_id = p.user_id AND fr.receiver_id = $1)
                OR (fr.sender_id = $1 AND fr.receiver_id = p.user_id))
        ))
    )
"#;

fn viewer_id(claims: &Option<Extension<Claims>>) -> i64 {
    claims.as_ref().map(|c| c.user_id()).unwrap_or(0)
}

pub(crate) async fn fetch_post(pool: &PgPool, viewer: i64, post_id: i64) -> Result<Post, AppError> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON p.user_id = u.id \
         WHERE p.id = $2 AND u.deleted_at IS NULL"
    );

    sqlx::query_as::<_, Post>(&sql)
        .bind(viewer)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))
}

/// Create a new post. A post must carry non-empty content or at least one
/// media item.
pub async fn create_post(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !payload.has_body() {
        return Err(AppError::BadRequest(
            "A post needs content or at least one media item".to_string(),
        ));
    }

    let user_id = claims.user_id();
    let content = clean_html(payload.content.as_deref().unwrap_or(""));
    let visibility = payload.visibility.unwrap_or_else(|| "public".to_string());
    let media = serde_json::to_value(payload.media.unwrap_or_default())?;

    let author_username = sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (user_id, content, visibility, media)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&content)
    .bind(&visibility)
    .bind(&media)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // Fan out to the author's friends off the response path.
    notify::fan_out_new_post_detached(
        pool.clone(),
        config.notification_ttl_days,
        user_id,
        author_username,
        post.id,
    );

    Ok((StatusCode::CREATED, Json(post)))
}

/// The feed: visibility-filtered, newest first, page/limit paginated.
/// Anonymous viewers see only public posts.
pub async fn list_feed(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = viewer_id(&claims);
    let page = params.page();
    let limit = params.limit();

    let count_sql = format!(
        "SELECT COUNT(*) FROM posts p JOIN users u ON p.user_id = u.id WHERE {FEED_VISIBILITY_WHERE}"
    );
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(viewer)
        .fetch_one(&pool)
        .await?;

    let list_sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p JOIN users u ON p.user_id = u.id \
         WHERE {FEED_VISIBILITY_WHERE} \
         ORDER BY p.created_at DESC LIMIT $2 OFFSET $3"
    );
    let posts = sqlx::query_as::<_, Post>(&list_sql)
        .bind(viewer)
        .bind(limit)
        .bind(params.skip())
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list feed: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(FeedResponse {
        posts,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Get a single post by ID, visibility-checked for the viewer.
pub async fn get_post(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = viewer_id(&claims);
    let post = fetch_post(&pool, viewer, id).await?;

    let viewer_opt = claims.as_ref().map(|c| c.user_id());
    if !visibility::can_view_post(&pool, viewer_opt, &post).await? {
        return Err(AppError::Forbidden(
            "You are not allowed to view this post".to_string(),
        ));
    }

    Ok(Json(post))
}

/// Edit a post. Author or admin/super_admin.
pub async fn update_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let post = fetch_post(&pool, claims.user_id(), id).await?;

    if post.user_id != claims.user_id() && !claims.is_moderator() {
        return Err(AppError::Forbidden(
            "You are not authorized to edit this post".to_string(),
        ));
    }

    if payload.content.is_none() && payload.visibility.is_none() && payload.media.is_none() {
        return Ok(Json(post));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE posts SET ");
    let mut separated = builder.separated(", ");

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }

    if let Some(visibility) = payload.visibility {
        separated.push("visibility = ");
        separated.push_bind_unseparated(visibility);
    }

    if let Some(media) = payload.media {
        separated.push("media = ");
        separated.push_bind_unseparated(serde_json::to_value(media).unwrap_or_default());
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update post {}: {:?}", id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    let updated = fetch_post(&pool, claims.user_id(), id).await?;
    Ok(Json(updated))
}

/// Delete a post. Author or admin/super_admin. Stored media objects are
/// removed exactly once each, best-effort, before the row goes away.
pub async fn delete_post(
    State(pool): State<PgPool>,
    State(media_store): State<Arc<dyn MediaStore>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = fetch_post(&pool, claims.user_id(), id).await?;

    if post.user_id != claims.user_id() && !claims.is_moderator() {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    for item in post.media_items() {
        if let Err(e) = media_store.delete(&item.storage_id).await {
            tracing::warn!("failed to delete media {} of post {}: {}", item.storage_id, id, e);
        }
    }

    // Comments, likes and bookmarks go with the row via FK cascade.
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "deleted": true })))
}

/// Toggle Like on a post. Membership in the likers set is the like; the
/// composite key makes the toggle idempotent under retry.
pub async fn toggle_like(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let author_id: i64 = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let liker_username = sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let mut tx = pool.begin().await?;

    let existing: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2)",
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_one(&mut *tx)
    .await?;

    if existing {
        sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
    }

    let likes_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;

    let is_liked = !existing;

    if is_liked && author_id != user_id {
        notify::dispatch_detached(
            pool.clone(),
            config.notification_ttl_days,
            NewNotification {
                recipient_id: author_id,
                actor_id: Some(user_id),
                r#type: "like".to_string(),
                title: format!("{} liked your post", liker_username),
                content: String::new(),
                related_item: Some(post_id),
                related_item_type: Some("post".to_string()),
            },
        );
    }

    Ok(Json(json!({ "liked": is_liked, "likes_count": likes_count })))
}

/// Toggle Bookmark on a post. Same contract as likes, independent set,
/// no notification.
pub async fn toggle_bookmark(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    sqlx::query_scalar::<_, i64>("SELECT user_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let mut tx = pool.begin().await?;

    let existing: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM post_bookmarks WHERE user_id = $1 AND post_id = $2)",
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_one(&mut *tx)
    .await?;

    if existing {
        sqlx::query("DELETE FROM post_bookmarks WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO post_bookmarks (user_id, post_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
    }

    let bookmarks_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM post_bookmarks WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;

    Ok(Json(json!({
        "bookmarked": !existing,
        "bookmarks_count": bookmarks_count
    })))
}

/// Bump the share counter.
pub async fn share_post(
    State(pool): State<PgPool>,
    Extension(_claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let shares_count: i64 = sqlx::query_scalar(
        "UPDATE posts SET shares_count = shares_count + 1 WHERE id = $1 RETURNING shares_count::BIGINT",
    )
    .bind(post_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(json!({ "shares_count": shares_count })))
}

/// List posts the current user has bookmarked.
pub async fn list_bookmarks(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts p \
         JOIN users u ON p.user_id = u.id \
         JOIN post_bookmarks b ON b.post_id = p.id AND b.user_id = $1 \
         WHERE u.deleted_at IS NULL \
         ORDER BY b.created_at DESC"
    );

    let posts = sqlx::query_as::<_, Post>(&sql)
        .bind(user_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(posts))
}
