use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::database::models::Tag;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::org::OrgRole;
use crate::services::TicketService;

use super::org_gate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1-50 characters"))]
    pub name: String,
}

/// GET /api/orgs/:org/tags - MEMBER and above; viewers cannot manage tags
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
) -> ApiResult<Vec<Tag>> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    let tags = TicketService::new(pool).list_tags(ctx.org.id).await?;
    Ok(ApiResponse::success(tags))
}

/// POST /api/orgs/:org/tags - create a tag, unique per organization
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
    Json(payload): Json<CreateTagRequest>,
) -> ApiResult<Tag> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    payload.validate()?;

    let tag = TicketService::new(pool)
        .create_tag(&ctx, payload.name.trim())
        .await?;

    Ok(ApiResponse::created(tag))
}
