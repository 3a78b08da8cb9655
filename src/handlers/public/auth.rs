use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{generate_jwt, Claims};
use crate::config;
use crate::database::models::User;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserService;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 60, message = "name must be 2-60 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 200, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    pub expires_in: u64,
}

fn auth_response(user: User) -> Result<AuthResponse, crate::error::ApiError> {
    let claims = Claims::new(user.id, user.email.clone(), user.name.clone());
    let token = generate_jwt(&claims)?;

    Ok(AuthResponse {
        token,
        user,
        expires_in: config::config().security.jwt_expiry_hours * 3600,
    })
}

/// POST /auth/register - create an account and sign in
pub async fn register(Json(payload): Json<RegisterRequest>) -> ApiResult<AuthResponse> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let user = UserService::new(pool)
        .register(payload.name.trim(), &payload.email, &payload.password)
        .await?;

    Ok(ApiResponse::created(auth_response(user)?))
}

/// POST /auth/login - authenticate and receive a bearer token
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<AuthResponse> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    let user = UserService::new(pool)
        .verify_credentials(&payload.email, &payload.password)
        .await?;

    Ok(ApiResponse::success(auth_response(user)?))
}
