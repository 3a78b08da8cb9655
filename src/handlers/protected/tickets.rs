use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{Ticket, TicketEvent};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::org::OrgRole;
use crate::services::ticket_service::{TicketPatch, TicketStatus};
use crate::services::TicketService;

use super::{clamp_limit, org_gate};

const TIMELINE_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[validate(length(max = 10000, message = "description is too long"))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 5, message = "severity must be 1-5"))]
    pub severity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTicketRequest {
    pub status: Option<String>,
    #[validate(range(min = 1, max = 5, message = "severity must be 1-5"))]
    pub severity: Option<i32>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 4000, message = "message is required"))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub events: Vec<TicketEvent>,
}

/// GET /api/orgs/:org/tickets - list, newest activity first
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Ticket>> {
    let (ctx, pool) = org_gate(&user, &org, None).await?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<TicketStatus>)
        .transpose()?;
    let limit = clamp_limit(query.limit);

    let tickets = TicketService::new(pool)
        .list(ctx.org.id, status, query.tag.as_deref(), limit)
        .await?;

    Ok(ApiResponse::success(tickets))
}

/// POST /api/orgs/:org/tickets - MEMBER and above (viewers are read-only)
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Path(org): Path<String>,
    Json(payload): Json<CreateTicketRequest>,
) -> ApiResult<Ticket> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    payload.validate()?;

    let ticket = TicketService::new(pool)
        .create(
            &ctx,
            payload.title.trim(),
            payload.description.as_deref(),
            payload.severity.unwrap_or(3),
        )
        .await?;

    Ok(ApiResponse::created(ticket))
}

/// GET /api/orgs/:org/tickets/:id - ticket with its timeline
pub async fn show(
    Extension(user): Extension<AuthUser>,
    Path((org, ticket_id)): Path<(String, Uuid)>,
) -> ApiResult<TicketDetail> {
    let (ctx, pool) = org_gate(&user, &org, None).await?;

    let (ticket, events) = TicketService::new(pool)
        .get_with_events(ctx.org.id, ticket_id, TIMELINE_LIMIT)
        .await?;

    Ok(ApiResponse::success(TicketDetail { ticket, events }))
}

/// PATCH /api/orgs/:org/tickets/:id - status/severity/assignee changes
pub async fn update(
    Extension(user): Extension<AuthUser>,
    Path((org, ticket_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateTicketRequest>,
) -> ApiResult<Ticket> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    payload.validate()?;
    if payload.status.is_none() && payload.severity.is_none() && payload.assigned_to.is_none() {
        return Err(ApiError::bad_request("No changes requested"));
    }

    let patch = TicketPatch {
        status: payload
            .status
            .as_deref()
            .map(str::parse::<TicketStatus>)
            .transpose()?,
        severity: payload.severity,
        assigned_to: payload.assigned_to,
    };

    let ticket = TicketService::new(pool).update(&ctx, ticket_id, patch).await?;

    Ok(ApiResponse::success(ticket))
}

/// POST /api/orgs/:org/tickets/:id/comments - append a COMMENT event
pub async fn comment(
    Extension(user): Extension<AuthUser>,
    Path((org, ticket_id)): Path<(String, Uuid)>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<TicketEvent> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    payload.validate()?;

    let event = TicketService::new(pool)
        .comment(&ctx, ticket_id, payload.message.trim())
        .await?;

    Ok(ApiResponse::created(event))
}

/// POST /api/orgs/:org/tickets/:id/tags/:tag - attach a tag
pub async fn attach_tag(
    Extension(user): Extension<AuthUser>,
    Path((org, ticket_id, tag)): Path<(String, Uuid, String)>,
) -> ApiResult<Value> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    TicketService::new(pool)
        .attach_tag(&ctx, ticket_id, &tag)
        .await?;

    Ok(ApiResponse::success(json!({ "attached": true })))
}

/// DELETE /api/orgs/:org/tickets/:id/tags/:tag - detach a tag
pub async fn detach_tag(
    Extension(user): Extension<AuthUser>,
    Path((org, ticket_id, tag)): Path<(String, Uuid, String)>,
) -> ApiResult<Value> {
    let (ctx, pool) = org_gate(&user, &org, Some(OrgRole::Member)).await?;

    TicketService::new(pool)
        .detach_tag(&ctx, ticket_id, &tag)
        .await?;

    Ok(ApiResponse::success(json!({ "detached": true })))
}
