use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub org_id: Uuid,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub severity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Timeline entry: comments, status/severity changes, assignments, tag
/// attach/detach.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketEvent {
    pub id: Uuid,
    pub org_id: Uuid,
    pub ticket_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: Option<String>,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
