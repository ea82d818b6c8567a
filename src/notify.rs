// src/notify.rs
//
// Notification fan-out. Every content action that notifies someone goes
// through the single `dispatch` primitive; call sites that must not block
// or fail the triggering mutation use the detached variants, which spawn
// the insert and only log failures.

use sqlx::PgPool;
use tokio::time::{Duration, interval};

use crate::error::AppError;
use crate::models::notification::{NewNotification, Notification};

/// Inserts a notification and returns it populated with actor display
/// fields.
pub async fn dispatch(
    pool: &PgPool,
    ttl_days: i64,
    n: NewNotification,
) -> Result<Notification, AppError> {
    if !n.is_valid() {
        return Err(AppError::BadRequest(format!(
            "invalid notification: type '{}', related type {:?}",
            n.r#type, n.related_item_type
        )));
    }

    let notification = sqlx::query_as::<_, Notification>(
        r#"
        WITH inserted AS (
            INSERT INTO notifications
                (recipient_id, actor_id, type, title, content,
                 related_item, related_item_type, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW() + make_interval(days => $8::int))
            RETURNING *
        )
        SELECT i.*, u.username AS actor_username, u.role AS actor_role
        FROM inserted i
        LEFT JOIN users u ON i.actor_id = u.id
        "#,
    )
    .bind(n.recipient_id)
    .bind(n.actor_id)
    .bind(&n.r#type)
    .bind(&n.title)
    .bind(&n.content)
    .bind(n.related_item)
    .bind(&n.related_item_type)
    .bind(ttl_days)
    .fetch_one(pool)
    .await?;

    Ok(notification)
}

/// Fire-and-forget dispatch. Failures are logged, never surfaced; the
/// triggering mutation's outcome is already decided by the time this runs.
pub fn dispatch_detached(pool: PgPool, ttl_days: i64, n: NewNotification) {
    tokio::spawn(async move {
        let kind = n.r#type.clone();
        let recipient = n.recipient_id;
        if let Err(e) = dispatch(&pool, ttl_days, n).await {
            tracing::warn!(
                "failed to dispatch '{}' notification to user {}: {}",
                kind,
                recipient,
                e
            );
        }
    });
}

/// New-post fan-out: one notification per friend of the author, in a
/// single insert-select.
pub async fn fan_out_new_post(
    pool: &PgPool,
    ttl_days: i64,
    author_id: i64,
    author_username: &str,
    post_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications
            (recipient_id, actor_id, type, title, content,
             related_item, related_item_type, expires_at)
        SELECT f.friend_id, $1, 'post', $2, '', $3, 'post',
               NOW() + make_interval(days => $4::int)
        FROM friendships f
        WHERE f.user_id = $1
        "#,
    )
    .bind(author_id)
    .bind(format!("{} published a new post", author_username))
    .bind(post_id)
    .bind(ttl_days)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Detached wrapper for the new-post fan-out.
pub fn fan_out_new_post_detached(
    pool: PgPool,
    ttl_days: i64,
    author_id: i64,
    author_username: String,
    post_id: i64,
) {
    tokio::spawn(async move {
        match fan_out_new_post(&pool, ttl_days, author_id, &author_username, post_id).await {
            Ok(count) => {
                tracing::debug!("post {} fanned out to {} friends", post_id, count);
            }
            Err(e) => {
                tracing::warn!("failed to fan out post {}: {}", post_id, e);
            }
        }
    });
}

/// Background task: removes expired notifications on a fixed interval,
/// independent of read state.
pub async fn run_expiry_purge(pool: PgPool, interval_secs: u64) {
    let mut tick = interval(Duration::from_secs(interval_secs));

    loop {
        tick.tick().await;

        match sqlx::query("DELETE FROM notifications WHERE expires_at < NOW()")
            .execute(&pool)
            .await
        {
            Ok(result) => {
                if result.rows_affected() > 0 {
                    tracing::info!("purged {} expired notifications", result.rows_affected());
                }
            }
            Err(e) => {
                tracing::error!("notification purge failed: {}", e);
            }
        }
    }
}
