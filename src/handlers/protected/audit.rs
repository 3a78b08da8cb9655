use axum::extract::{Extension, Path, Query};
use serde::Deserialize;

use crate::database::models::AuditEntry;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::org_service::OrgError;
use crate::services::AuditService;

use super::{clamp_limit, org_gate};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /api/orgs/:org/audit - insert-only trail, newest first
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<AuditEntry>> {
    let (ctx, pool) = org_gate(&user, &org, None).await?;

    let entries = AuditService::new(pool)
        .list(ctx.org.id, clamp_limit(query.limit))
        .await
        .map_err(OrgError::Database)?;

    Ok(ApiResponse::success(entries))
}
