use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::database::models::MemberView;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::org::OrgRole;
use crate::services::OrgService;

use super::org_gate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    /// Defaults to MEMBER, matching the add-member dialog.
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: String,
}

/// GET /api/orgs/:org/members - ADMIN and above
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
) -> ApiResult<Vec<MemberView>> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Admin)).await?;

    let members = OrgService::new(pool).members(ctx.org.id).await?;
    Ok(ApiResponse::success(members))
}

/// POST /api/orgs/:org/members - add a registered user by email
pub async fn add(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
    Json(payload): Json<AddMemberRequest>,
) -> ApiResult<MemberView> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Admin)).await?;

    payload.validate()?;
    let role: OrgRole = payload
        .role
        .as_deref()
        .unwrap_or(OrgRole::Member.as_str())
        .parse()?;

    let member = OrgService::new(pool)
        .add_member(&ctx, &payload.email, role)
        .await?;

    Ok(ApiResponse::created(member))
}

/// PATCH /api/orgs/:org/members/:user - change a member's role
pub async fn update_role(
    Extension(user): Extension<AuthUser>,
    Path((org, target_user)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateMemberRequest>,
) -> ApiResult<Value> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Admin)).await?;

    let role: OrgRole = payload.role.parse()?;
    OrgService::new(pool)
        .change_role(&ctx, target_user, role)
        .await?;

    Ok(ApiResponse::success(json!({ "updated": true })))
}

/// DELETE /api/orgs/:org/members/:user - remove a member
pub async fn remove(
    Extension(user): Extension<AuthUser>,
    Path((org, target_user)): Path<(String, Uuid)>,
) -> ApiResult<Value> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Admin)).await?;

    OrgService::new(pool).remove_member(&ctx, target_user).await?;

    Ok(ApiResponse::success(json!({ "removed": true })))
}
