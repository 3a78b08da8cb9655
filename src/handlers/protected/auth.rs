use axum::{extract::Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::database::models::User;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::UserService;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, max = 200, message = "current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 200, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

/// GET /api/auth/whoami - fresh profile for the authenticated caller
pub async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResult<User> {
    let pool = DatabaseManager::pool().await?;
    let fresh = UserService::new(pool).get(user.id).await?;
    Ok(ApiResponse::success(fresh))
}

/// PUT /api/auth/password - rotate the caller's password
pub async fn update_password(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<Value> {
    payload.validate()?;

    let pool = DatabaseManager::pool().await?;
    UserService::new(pool)
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(ApiResponse::success(json!({ "updated": true })))
}

/// DELETE /api/auth/session - sign out
///
/// Tokens are stateless; the server has nothing to revoke. The endpoint
/// exists so clients have a uniform sign-out call.
pub async fn logout(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    tracing::debug!(user = %user.id, "session sign-out");
    Ok(ApiResponse::success(json!({ "signed_out": true })))
}
