// src/handlers/auth.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, User, validate_profile_shape},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user with a role-specific profile.
///
/// Hashes the password using Argon2 before storing it. The account starts
/// unverified; the verification token is returned in the response body
/// (mail delivery is handled by an external collaborator).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let profile = payload.profile.unwrap_or_else(|| json!({}));
    validate_profile_shape(&payload.role, &profile).map_err(AppError::BadRequest)?;

    let hashed_password = hash_password(&payload.password)?;
    let verification_token = uuid::Uuid::new_v4().to_string();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password, role, profile, verification_token)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(&payload.role)
    .bind(&profile)
    .bind(&verification_token)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        // Postgres error code for unique violation is 23505
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict("Username or email already registered".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": user,
            "verification_token": verification_token,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: String,
}

/// Activates an account from its verification token.
pub async fn verify(
    State(pool): State<PgPool>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET is_verified = TRUE, verification_token = NULL
        WHERE verification_token = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(&params.token)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Unknown verification token".to_string()));
    }

    Ok(Json(json!({ "verified": true })))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError("User not found".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    let token = sign_jwt(
        user.id,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user_id": user.id,
        "role": user.role,
        "is_verified": user.is_verified
    })))
}
