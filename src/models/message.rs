// src/models/message.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'messages' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub image_storage_id: Option<String>,
    pub is_read: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a direct message.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 5000, message = "Message must be at most 5000 characters"))]
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub image_storage_id: Option<String>,
}

impl SendMessageRequest {
    /// A message must have non-empty text OR an image.
    pub fn has_body(&self) -> bool {
        let has_content = self
            .content
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        has_content || self.image_url.is_some()
    }
}

/// DTO for editing a message. Sender only.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessageRequest {
    #[validate(length(max = 5000))]
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub image_storage_id: Option<String>,
}

/// One row of the conversation overview: the partner plus the latest
/// message and how many of theirs are still unread.
#[derive(Debug, Serialize, FromRow)]
pub struct ConversationSummary {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub last_content: String,
    pub last_at: Option<chrono::DateTime<chrono::Utc>>,
    pub unread_count: i64,
}
