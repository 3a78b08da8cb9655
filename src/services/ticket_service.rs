use std::fmt;
use std::str::FromStr;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::database::is_unique_violation;
use crate::database::models::{Tag, Ticket, TicketEvent};
use crate::org::OrgContext;
use crate::services::audit_service;

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket not found")]
    NotFound,
    #[error("tag name already in use")]
    TagExists,
    #[error("tag not found")]
    TagNotFound,
    #[error("tag already attached")]
    TagAlreadyAttached,
    #[error("assignee is not a member")]
    AssigneeNotMember,
    #[error("unknown ticket status: {0}")]
    InvalidStatus(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Ticket workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    Investigating,
    Mitigated,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::Investigating => "INVESTIGATING",
            TicketStatus::Mitigated => "MITIGATED",
            TicketStatus::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(TicketStatus::Open),
            "INVESTIGATING" => Ok(TicketStatus::Investigating),
            "MITIGATED" => Ok(TicketStatus::Mitigated),
            "RESOLVED" => Ok(TicketStatus::Resolved),
            other => Err(TicketError::InvalidStatus(other.to_string())),
        }
    }
}

/// Timeline event kinds.
#[derive(Debug, Clone, Copy)]
pub enum EventKind {
    Created,
    Comment,
    StatusChanged,
    SeverityChanged,
    Assigned,
    TagAdded,
    TagRemoved,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "CREATED",
            EventKind::Comment => "COMMENT",
            EventKind::StatusChanged => "STATUS_CHANGED",
            EventKind::SeverityChanged => "SEVERITY_CHANGED",
            EventKind::Assigned => "ASSIGNED",
            EventKind::TagAdded => "TAG_ADDED",
            EventKind::TagRemoved => "TAG_REMOVED",
        }
    }
}

/// Field changes for PATCH. Absent fields are left untouched.
#[derive(Debug, Default)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub severity: Option<i32>,
    pub assigned_to: Option<Uuid>,
}

pub struct TicketService {
    pool: PgPool,
}

const TICKET_COLUMNS: &str =
    "id, org_id, created_by, assigned_to, title, description, status, severity, created_at, updated_at";

impl TicketService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tickets for one organization, newest activity first. Optional status
    /// and tag filters.
    pub async fn list(
        &self,
        org_id: Uuid,
        status: Option<TicketStatus>,
        tag: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Ticket>, TicketError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM tickets WHERE org_id = ",
            TICKET_COLUMNS
        ));
        builder.push_bind(org_id);

        if let Some(status) = status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(tag) = tag {
            builder.push(
                " AND id IN (SELECT tt.ticket_id FROM ticket_tags tt \
                 JOIN tags t ON t.id = tt.tag_id WHERE t.org_id = ",
            );
            builder.push_bind(org_id);
            builder.push(" AND t.name = ");
            builder.push_bind(tag);
            builder.push(")");
        }

        builder.push(" ORDER BY updated_at DESC LIMIT ");
        builder.push_bind(limit);

        let tickets = builder
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await?;

        Ok(tickets)
    }

    pub async fn create(
        &self,
        ctx: &OrgContext,
        title: &str,
        description: Option<&str>,
        severity: i32,
    ) -> Result<Ticket, TicketError> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            INSERT INTO tickets (org_id, created_by, title, description, severity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(ctx.org.id)
        .bind(ctx.user.id)
        .bind(title)
        .bind(description)
        .bind(severity)
        .fetch_one(&mut *tx)
        .await?;

        insert_event(
            &mut tx,
            ctx,
            ticket.id,
            EventKind::Created,
            Some(&format!("Ticket opened: {}", title)),
        )
        .await?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "ticket.created",
            "ticket",
            Some(ticket.id),
        )
        .await?;

        tx.commit().await?;
        Ok(ticket)
    }

    /// Fetch one ticket with its timeline, newest events first.
    pub async fn get_with_events(
        &self,
        org_id: Uuid,
        ticket_id: Uuid,
        event_limit: i64,
    ) -> Result<(Ticket, Vec<TicketEvent>), TicketError> {
        let ticket = self.fetch_in_org(org_id, ticket_id).await?;

        let events = sqlx::query_as::<_, TicketEvent>(
            r#"
            SELECT id, org_id, ticket_id, event_type, message, actor_id, created_at
            FROM ticket_events
            WHERE org_id = $1 AND ticket_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(org_id)
        .bind(ticket_id)
        .bind(event_limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((ticket, events))
    }

    /// Apply a patch. Every changed field appends its own timeline event.
    pub async fn update(
        &self,
        ctx: &OrgContext,
        ticket_id: Uuid,
        patch: TicketPatch,
    ) -> Result<Ticket, TicketError> {
        let current = self.fetch_in_org(ctx.org.id, ticket_id).await?;

        if let Some(assignee) = patch.assigned_to {
            self.ensure_member(ctx.org.id, assignee).await?;
        }

        let mut tx = self.pool.begin().await?;

        let new_status = patch.status.map(|s| s.as_str().to_string());
        let updated = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET status = COALESCE($1, status),
                severity = COALESCE($2, severity),
                assigned_to = COALESCE($3, assigned_to),
                updated_at = now()
            WHERE id = $4 AND org_id = $5
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(new_status.as_deref())
        .bind(patch.severity)
        .bind(patch.assigned_to)
        .bind(ticket_id)
        .bind(ctx.org.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(TicketError::NotFound)?;

        if let Some(status) = patch.status {
            if status.as_str() != current.status {
                insert_event(
                    &mut tx,
                    ctx,
                    ticket_id,
                    EventKind::StatusChanged,
                    Some(&format!("{} -> {}", current.status, status)),
                )
                .await?;
            }
        }
        if let Some(severity) = patch.severity {
            if severity != current.severity {
                insert_event(
                    &mut tx,
                    ctx,
                    ticket_id,
                    EventKind::SeverityChanged,
                    Some(&format!("Severity {} -> {}", current.severity, severity)),
                )
                .await?;
            }
        }
        if let Some(assignee) = patch.assigned_to {
            if current.assigned_to != Some(assignee) {
                insert_event(
                    &mut tx,
                    ctx,
                    ticket_id,
                    EventKind::Assigned,
                    Some(&format!("Assigned to {}", assignee)),
                )
                .await?;
            }
        }

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "ticket.updated",
            "ticket",
            Some(ticket_id),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn comment(
        &self,
        ctx: &OrgContext,
        ticket_id: Uuid,
        message: &str,
    ) -> Result<TicketEvent, TicketError> {
        self.fetch_in_org(ctx.org.id, ticket_id).await?;

        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, TicketEvent>(
            r#"
            INSERT INTO ticket_events (org_id, ticket_id, event_type, message, actor_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, org_id, ticket_id, event_type, message, actor_id, created_at
            "#,
        )
        .bind(ctx.org.id)
        .bind(ticket_id)
        .bind(EventKind::Comment.as_str())
        .bind(message)
        .bind(ctx.user.id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE tickets SET updated_at = now() WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "ticket.commented",
            "ticket",
            Some(ticket_id),
        )
        .await?;

        tx.commit().await?;
        Ok(event)
    }

    pub async fn list_tags(&self, org_id: Uuid) -> Result<Vec<Tag>, TicketError> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT id, org_id, name, created_at FROM tags WHERE org_id = $1 ORDER BY created_at ASC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    pub async fn create_tag(&self, ctx: &OrgContext, name: &str) -> Result<Tag, TicketError> {
        let mut tx = self.pool.begin().await?;

        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (org_id, name)
            VALUES ($1, $2)
            RETURNING id, org_id, name, created_at
            "#,
        )
        .bind(ctx.org.id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TicketError::TagExists
            } else {
                TicketError::Database(e)
            }
        })?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "tag.created",
            "tag",
            Some(tag.id),
        )
        .await?;

        tx.commit().await?;
        Ok(tag)
    }

    pub async fn attach_tag(
        &self,
        ctx: &OrgContext,
        ticket_id: Uuid,
        tag_ref: &str,
    ) -> Result<(), TicketError> {
        self.fetch_in_org(ctx.org.id, ticket_id).await?;
        let tag = self.fetch_tag(ctx.org.id, tag_ref).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO ticket_tags (ticket_id, tag_id) VALUES ($1, $2)")
            .bind(ticket_id)
            .bind(tag.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    TicketError::TagAlreadyAttached
                } else {
                    TicketError::Database(e)
                }
            })?;

        insert_event(
            &mut tx,
            ctx,
            ticket_id,
            EventKind::TagAdded,
            Some(&format!("Tagged {}", tag.name)),
        )
        .await?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "ticket.tag_added",
            "ticket",
            Some(ticket_id),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn detach_tag(
        &self,
        ctx: &OrgContext,
        ticket_id: Uuid,
        tag_ref: &str,
    ) -> Result<(), TicketError> {
        self.fetch_in_org(ctx.org.id, ticket_id).await?;
        let tag = self.fetch_tag(ctx.org.id, tag_ref).await?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM ticket_tags WHERE ticket_id = $1 AND tag_id = $2")
            .bind(ticket_id)
            .bind(tag.id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TicketError::TagNotFound);
        }

        insert_event(
            &mut tx,
            ctx,
            ticket_id,
            EventKind::TagRemoved,
            Some(&format!("Untagged {}", tag.name)),
        )
        .await?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "ticket.tag_removed",
            "ticket",
            Some(ticket_id),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Org-scoped fetch: an id from another organization is a plain 404.
    async fn fetch_in_org(&self, org_id: Uuid, ticket_id: Uuid) -> Result<Ticket, TicketError> {
        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1 AND org_id = $2",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TicketError::NotFound)
    }

    async fn fetch_tag(&self, org_id: Uuid, tag_ref: &str) -> Result<Tag, TicketError> {
        let row = match Uuid::parse_str(tag_ref) {
            Ok(id) => {
                sqlx::query_as::<_, Tag>(
                    "SELECT id, org_id, name, created_at FROM tags WHERE org_id = $1 AND id = $2",
                )
                .bind(org_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            Err(_) => {
                sqlx::query_as::<_, Tag>(
                    "SELECT id, org_id, name, created_at FROM tags WHERE org_id = $1 AND name = $2",
                )
                .bind(org_id)
                .bind(tag_ref)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.ok_or(TicketError::TagNotFound)
    }

    async fn ensure_member(&self, org_id: Uuid, user_id: Uuid) -> Result<(), TicketError> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM org_memberships WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if exists == 0 {
            return Err(TicketError::AssigneeNotMember);
        }
        Ok(())
    }
}

async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    ctx: &OrgContext,
    ticket_id: Uuid,
    kind: EventKind,
    message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ticket_events (org_id, ticket_id, event_type, message, actor_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(ctx.org.id)
    .bind(ticket_id)
    .bind(kind.as_str())
    .bind(message)
    .bind(ctx.user.id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
