// src/models/notification.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const NOTIFICATION_TYPES: &[&str] = &[
    "message",
    "post",
    "friend_request",
    "friend_accept",
    "event",
    "like",
    "comment",
];

/// Collections a notification's related item may point into.
pub const RELATED_ITEM_TYPES: &[&str] = &["user", "post", "comment", "message", "friend_request"];

/// Represents the 'notifications' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: i64,
    pub actor_id: Option<i64>,
    pub r#type: String,
    pub title: String,
    pub content: String,

    /// Polymorphic reference, typed by `related_item_type`.
    pub related_item: Option<i64>,
    pub related_item_type: Option<String>,

    pub is_read: bool,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Actor display fields, joined in list queries.
    #[sqlx(default)]
    #[serde(default)]
    pub actor_username: Option<String>,
    #[sqlx(default)]
    #[serde(default)]
    pub actor_role: Option<String>,
}

/// Input for the single notification creation primitive.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub actor_id: Option<i64>,
    pub r#type: String,
    pub title: String,
    pub content: String,
    pub related_item: Option<i64>,
    pub related_item_type: Option<String>,
}

impl NewNotification {
    /// `related_item_type` must come from the fixed enum, and must be set
    /// whenever `related_item` is.
    pub fn is_valid(&self) -> bool {
        if !NOTIFICATION_TYPES.contains(&self.r#type.as_str()) {
            return false;
        }
        match (&self.related_item, &self.related_item_type) {
            (Some(_), Some(t)) => RELATED_ITEM_TYPES.contains(&t.as_str()),
            (Some(_), None) => false,
            (None, Some(t)) => RELATED_ITEM_TYPES.contains(&t.as_str()),
            (None, None) => true,
        }
    }
}
