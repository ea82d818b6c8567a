// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Roles a user can register with. 'admin' and 'super_admin' are only
/// assigned by seeding or by another admin, never at registration.
pub const REGISTRABLE_ROLES: &[&str] = &[
    "entrepreneur",
    "investor",
    "startup",
    "organisation",
    "university",
];

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique email, used for login.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// One of: entrepreneur, investor, startup, organisation, university,
    /// admin, super_admin.
    pub role: String,

    /// Role-specific profile sub-record.
    pub profile: serde_json::Value,

    /// Whether the account has completed the verification step.
    pub is_verified: bool,

    #[serde(skip)]
    pub verification_token: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Soft-delete marker. Non-NULL accounts are excluded from lookups.
    #[serde(skip)]
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Subset of user fields exposed when listing someone else's profile
/// (friend lists, request lists, actor fields).
#[derive(Debug, Serialize, FromRow)]
pub struct FriendProfile {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub profile: serde_json::Value,
}

/// Aggregated profile data for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub profile: serde_json::Value,
    pub is_verified: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub posts_count: i64,
    pub friends_count: i64,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    #[validate(email(message = "A valid email address is required."))]
    pub email: String,

    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,

    #[validate(custom(function = validate_role))]
    pub role: String,

    /// Role-specific profile sub-record. Optional at registration.
    #[validate(custom(function = validate_profile_size))]
    pub profile: Option<serde_json::Value>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Restricts registration to the public roles.
fn validate_role(role: &str) -> Result<(), validator::ValidationError> {
    if !REGISTRABLE_ROLES.contains(&role) {
        return Err(validator::ValidationError::new("invalid_role"));
    }
    Ok(())
}

/// Limits the profile JSON payload size to prevent resource exhaustion.
fn validate_profile_size(profile: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if profile.to_string().len() > 10_000 {
        return Err(validator::ValidationError::new("profile_too_large"));
    }
    Ok(())
}

/// Keys accepted in the profile sub-record, per role.
fn allowed_profile_keys(role: &str) -> &'static [&'static str] {
    match role {
        "entrepreneur" => &["startup_name", "industry", "stage", "bio", "website"],
        "investor" => &["firm", "focus_areas", "ticket_size", "bio", "website"],
        "startup" => &["company_name", "industry", "stage", "bio", "website"],
        "organisation" => &["org_name", "sector", "bio", "website"],
        "university" => &["institution", "department", "bio", "website"],
        _ => &["bio"],
    }
}

/// Checks the profile sub-record against the registering role: it must be
/// a JSON object and may only carry keys known for that role.
pub fn validate_profile_shape(role: &str, profile: &serde_json::Value) -> Result<(), String> {
    let obj = profile
        .as_object()
        .ok_or_else(|| "profile must be a JSON object".to_string())?;

    let allowed = allowed_profile_keys(role);
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(format!("unknown profile field '{}' for role '{}'", key, role));
        }
    }
    Ok(())
}
