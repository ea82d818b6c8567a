// src/visibility.rs
//
// Decides whether a viewer may see a post, and builds the feed's
// candidate set. 'connections' visibility is tested against the accepted
// friend-request edges with a symmetric existence query rather than the
// mirrored friendship rows, so a half-written mirror can never widen or
// narrow access.

use sqlx::PgPool;

use crate::error::AppError;
use crate::models::post::Post;

/// Pure decision procedure, separated from storage so it can be tested
/// without a database.
///
/// * public      -> visible to everyone.
/// * private     -> visible only to the author.
/// * connections -> visible to the author and accepted friends.
///
/// Anonymous viewers only ever get the public case. Unknown visibility
/// values deny by default.
pub fn can_view(viewer: Option<i64>, author_id: i64, visibility: &str, connected: bool) -> bool {
    match visibility {
        "public" => true,
        "private" => viewer == Some(author_id),
        "connections" => match viewer {
            Some(id) => id == author_id || connected,
            None => false,
        },
        _ => false,
    }
}

/// Symmetric existence query: is there an accepted edge between the two
/// users, in either direction?
pub async fn are_connected(pool: &PgPool, a: i64, b: i64) -> Result<bool, AppError> {
    let connected: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM friend_requests
            WHERE status = 'accepted'
              AND ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
        )
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(pool)
    .await?;

    Ok(connected)
}

/// Full check for a loaded post. Only hits the database when the
/// decision actually depends on the friend graph.
pub async fn can_view_post(
    pool: &PgPool,
    viewer: Option<i64>,
    post: &Post,
) -> Result<bool, AppError> {
    let needs_edge_check = post.visibility == "connections"
        && viewer.is_some()
        && viewer != Some(post.user_id);

    let connected = if needs_edge_check {
        are_connected(pool, viewer.unwrap_or(0), post.user_id).await?
    } else {
        false
    };

    Ok(can_view(viewer, post.user_id, &post.visibility, connected))
}
