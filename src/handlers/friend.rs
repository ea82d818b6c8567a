// src/handlers/friend.rs
//
// Friend graph: directed request edges plus the mirrored friendships
// derived from accepted edges.

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
        friend::{FriendRequest, PendingRequestResponse, RespondFriendRequest, SendFriendRequest},
        notification::NewNotification,
        user::FriendProfile,
    },
    notify,
    utils::jwt::Claims,
};

async fn username_of(pool: &PgPool, user_id: i64) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Send a friend request.
///
/// Fails if any edge already exists between the pair in either direction,
/// whatever its status: a rejected request blocks resends by policy.
pub async fn send_request(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendFriendRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sender_id = claims.user_id();

    if payload.receiver_id == sender_id {
        return Err(AppError::BadRequest(
            "You cannot send a friend request to yourself".to_string(),
        ));
    }

    // 404 before duplicate check so a request at a deleted account reads
    // as "not found", not "duplicate".
    let _receiver = username_of(&pool, payload.receiver_id).await?;
    let sender_username = username_of(&pool, sender_id).await?;

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM friend_requests
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
        )
        "#,
    )
    .bind(sender_id)
    .bind(payload.receiver_id)
    .fetch_one(&pool)
    .await?;

    if exists {
        return Err(AppError::BadRequest(
            "A friend request already exists between these users".to_string(),
        ));
    }

    let request = sqlx::query_as::<_, FriendRequest>(
        r#"
        INSERT INTO friend_requests (sender_id, receiver_id, status)
        VALUES ($1, $2, 'pending')
        RETURNING *
        "#,
    )
    .bind(sender_id)
    .bind(payload.receiver_id)
    .fetch_one(&pool)
    .await?;

    notify::dispatch_detached(
        pool.clone(),
        config.notification_ttl_days,
        NewNotification {
            recipient_id: payload.receiver_id,
            actor_id: Some(sender_id),
            r#type: "friend_request".to_string(),
            title: format!("{} sent you a friend request", sender_username),
            content: String::new(),
            related_item: Some(request.id),
            related_item_type: Some("friend_request".to_string()),
        },
    );

    Ok((StatusCode::CREATED, Json(request)))
}

/// Respond to a pending friend request. Receiver only.
///
/// Accepting mirrors both users into each other's friendship rows with
/// set semantics and notifies the original sender.
pub async fn respond(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
    Json(payload): Json<RespondFriendRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let responder_id = claims.user_id();

    let request = sqlx::query_as::<_, FriendRequest>(
        "SELECT * FROM friend_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Friend request not found".to_string()))?;

    if request.receiver_id != responder_id {
        return Err(AppError::Forbidden(
            "Only the receiver can respond to this request".to_string(),
        ));
    }

    if request.status != "pending" {
        return Err(AppError::BadRequest(
            "This request has already been responded to".to_string(),
        ));
    }

    let responder_username = username_of(&pool, responder_id).await?;

    let mut tx = pool.begin().await?;

    let updated = sqlx::query_as::<_, FriendRequest>(
        r#"
        UPDATE friend_requests
        SET status = $1, responded_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(&payload.action)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    if payload.action == "accepted" {
        // Mirrored insert, set semantics: the composite PK makes a
        // concurrent duplicate a no-op.
        sqlx::query(
            r#"
            INSERT INTO friendships (user_id, friend_id)
            VALUES ($1, $2), ($2, $1)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(request.sender_id)
        .bind(request.receiver_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if payload.action == "accepted" {
        notify::dispatch_detached(
            pool.clone(),
            config.notification_ttl_days,
            NewNotification {
                recipient_id: request.sender_id,
                actor_id: Some(responder_id),
                r#type: "friend_accept".to_string(),
                title: format!("{} accepted your friend request", responder_username),
                content: String::new(),
                related_item: Some(responder_id),
                related_item_type: Some("user".to_string()),
            },
        );
    }

    Ok(Json(updated))
}

/// List the current user's friends with a subset of profile fields.
pub async fn list_friends(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let friends = sqlx::query_as::<_, FriendProfile>(
        r#"
        SELECT u.id, u.username, u.role, u.profile
        FROM friendships f
        JOIN users u ON f.friend_id = u.id
        WHERE f.user_id = $1 AND u.deleted_at IS NULL
        ORDER BY u.username
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(friends))
}

/// List incoming pending friend requests.
pub async fn list_pending(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let requests = sqlx::query_as::<_, PendingRequestResponse>(
        r#"
        SELECT r.id, r.sender_id, u.username AS sender_username,
               u.role AS sender_role, r.status, r.created_at
        FROM friend_requests r
        JOIN users u ON r.sender_id = u.id
        WHERE r.receiver_id = $1 AND r.status = 'pending' AND u.deleted_at IS NULL
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(requests))
}

/// Remove a friendship. Pulls both mirrored rows; removing a non-friend
/// is a no-op, not an error. The originating request edge is left as
/// history.
pub async fn remove_friend(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let result = sqlx::query(
        r#"
        DELETE FROM friendships
        WHERE (user_id = $1 AND friend_id = $2)
           OR (user_id = $2 AND friend_id = $1)
        "#,
    )
    .bind(user_id)
    .bind(friend_id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "removed": result.rows_affected() > 0 })))
}
