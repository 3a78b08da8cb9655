use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// An organization as seen from one member's perspective.
#[derive(Debug, Clone, Serialize)]
pub struct OrgMembershipView {
    #[serde(flatten)]
    pub org: Organization,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// One row of the members table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberView {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}
