// src/models/post.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const VISIBILITIES: &[&str] = &["public", "private", "connections"];

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;

/// A media object attached to a post: where it is served from and the
/// storage id needed to delete it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub storage_id: String,
    pub media_type: String,
}

/// Represents the 'posts' table in the database.
///
/// Like/bookmark membership lives in junction tables; the count and
/// membership fields here are derived per-query and default to zero when
/// a query does not compute them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,

    /// 'public', 'private' or 'connections'.
    pub visibility: String,

    /// JSON list of `MediaItem`.
    pub media: serde_json::Value,

    pub shares_count: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,

    #[sqlx(default)]
    #[serde(default)]
    pub likes_count: i64,
    #[sqlx(default)]
    #[serde(default)]
    pub comments_count: i64,
    #[sqlx(default)]
    #[serde(default)]
    pub bookmarks_count: i64,

    /// Whether the requesting user has liked this post.
    #[sqlx(default)]
    #[serde(default)]
    pub is_liked: bool,
    /// Whether the requesting user has bookmarked this post.
    #[sqlx(default)]
    #[serde(default)]
    pub is_bookmarked: bool,
}

impl Post {
    /// Deserializes the media JSON column.
    pub fn media_items(&self) -> Vec<MediaItem> {
        serde_json::from_value(self.media.clone()).unwrap_or_default()
    }
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(max = 10000, message = "Content must be at most 10000 characters"))]
    pub content: Option<String>,

    #[validate(custom(function = validate_visibility))]
    pub visibility: Option<String>,

    pub media: Option<Vec<MediaItem>>,
}

impl CreatePostRequest {
    /// A post must have non-empty content OR at least one media item.
    pub fn has_body(&self) -> bool {
        let has_content = self
            .content
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        let has_media = self.media.as_deref().map(|m| !m.is_empty()).unwrap_or(false);
        has_content || has_media
    }
}

/// DTO for editing a post. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(max = 10000))]
    pub content: Option<String>,

    #[validate(custom(function = validate_visibility))]
    pub visibility: Option<String>,

    pub media: Option<Vec<MediaItem>>,
}

/// Query parameters for the feed.
#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl FeedParams {
    /// Page is 1-based; anything below 1 clamps to 1.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Limit clamps to [1, 50], default 10.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn skip(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Pagination metadata block returned alongside feed pages.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

fn validate_visibility(visibility: &str) -> Result<(), validator::ValidationError> {
    if !VISIBILITIES.contains(&visibility) {
        return Err(validator::ValidationError::new("invalid_visibility"));
    }
    Ok(())
}
