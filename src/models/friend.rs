// src/models/friend.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'friend_requests' table: a directed edge with a status.
/// The undirected "friends" relation is derived by mirroring accepted
/// edges into the 'friendships' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    /// 'pending', 'accepted' or 'rejected'. Transitions out of 'pending'
    /// exactly once.
    pub status: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub responded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a friend request.
#[derive(Debug, Deserialize)]
pub struct SendFriendRequest {
    pub receiver_id: i64,
}

/// DTO for responding to a friend request.
#[derive(Debug, Deserialize, Validate)]
pub struct RespondFriendRequest {
    #[validate(custom(function = validate_action))]
    pub action: String,
}

/// An incoming pending request with sender display fields.
#[derive(Debug, Serialize, FromRow)]
pub struct PendingRequestResponse {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub sender_role: String,
    pub status: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn validate_action(action: &str) -> Result<(), validator::ValidationError> {
    if action != "accepted" && action != "rejected" {
        return Err(validator::ValidationError::new("invalid_action"));
    }
    Ok(())
}
