use axum::extract::{Extension, Path};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::database::models::{Organization, OrgMembershipView};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::org::OrgRole;
use crate::services::OrgService;

use super::org_gate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrgRequest {
    #[validate(length(min = 2, max = 80, message = "name must be 2-80 characters"))]
    pub name: String,
}

/// Overview payload. `role` lets clients hide affordances below the caller's
/// level; the server-side gate stays the real boundary.
#[derive(Debug, Serialize)]
pub struct OrgOverview {
    pub organization: Organization,
    pub role: String,
    pub tickets_count: i64,
    pub members_count: i64,
}

/// GET /api/orgs - organizations the caller belongs to
pub async fn list(Extension(user): Extension<AuthUser>) -> ApiResult<Vec<OrgMembershipView>> {
    let pool = crate::database::DatabaseManager::pool().await?;
    let orgs = OrgService::new(pool).list_for_user(user.id).await?;
    Ok(ApiResponse::success(orgs))
}

/// POST /api/orgs - create an organization; the caller becomes OWNER
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateOrgRequest>,
) -> ApiResult<Organization> {
    payload.validate()?;

    let pool = crate::database::DatabaseManager::pool().await?;
    let org = OrgService::new(pool)
        .create(payload.name.trim(), user.id)
        .await?;

    Ok(ApiResponse::created(org))
}

/// GET /api/orgs/:org - overview with counts
pub async fn overview(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
) -> ApiResult<OrgOverview> {
    let (ctx, pool) = org_gate(&user, &org, None).await?;

    let (tickets_count, members_count) = OrgService::new(pool).counts(ctx.org.id).await?;

    Ok(ApiResponse::success(OrgOverview {
        role: ctx.role.as_str().to_string(),
        organization: ctx.org,
        tickets_count,
        members_count,
    }))
}

/// DELETE /api/orgs/:org - OWNER only
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
) -> ApiResult<Value> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Owner)).await?;

    OrgService::new(pool).delete(&ctx).await?;

    Ok(ApiResponse::success(json!({ "deleted": true })))
}
