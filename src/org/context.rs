use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::Organization;
use crate::middleware::AuthUser;
use crate::org::role::OrgRole;

/// Organization identifier as it arrives from a route parameter: either the
/// canonical UUID or the human-readable slug. Both shapes resolve through the
/// same membership lookup, so a caller cannot tell "no such organization"
/// apart from "not a member of it".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgRef {
    Id(Uuid),
    Slug(String),
}

#[derive(Debug, Error)]
#[error("organization identifier must be a non-empty string")]
pub struct InvalidOrgRef;

impl OrgRef {
    pub fn parse(raw: &str) -> Result<Self, InvalidOrgRef> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvalidOrgRef);
        }
        match Uuid::parse_str(raw) {
            Ok(id) => Ok(OrgRef::Id(id)),
            Err(_) => Ok(OrgRef::Slug(raw.to_string())),
        }
    }
}

/// A caller's membership in one organization, as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub role: OrgRole,
    pub org: Organization,
}

/// Per-request authorization context. Computed fresh on every request and
/// never cached across requests, so role changes take effect on the very
/// next call.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgContext {
    pub user: AuthUser,
    pub role: OrgRole,
    pub org: Organization,
}

impl OrgContext {
    pub fn can(&self, minimum: OrgRole) -> bool {
        self.role.is_at_least(minimum)
    }
}

/// Membership lookup seam. The production implementation reads Postgres;
/// tests inject in-memory fakes.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        user_id: Uuid,
        org: &OrgRef,
    ) -> Result<Option<Membership>, sqlx::Error>;
}

/// Postgres-backed membership store. One join resolves the identifier and
/// the membership together; an unknown slug and a missing membership are the
/// same `None` from the caller's point of view.
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MEMBERSHIP_BY_ID: &str = r#"
    SELECT m.role, o.id, o.name, o.slug, o.created_at
    FROM org_memberships m
    JOIN organizations o ON o.id = m.org_id
    WHERE m.user_id = $1 AND o.id = $2
"#;

const MEMBERSHIP_BY_SLUG: &str = r#"
    SELECT m.role, o.id, o.name, o.slug, o.created_at
    FROM org_memberships m
    JOIN organizations o ON o.id = m.org_id
    WHERE m.user_id = $1 AND o.slug = $2
"#;

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn find_membership(
        &self,
        user_id: Uuid,
        org: &OrgRef,
    ) -> Result<Option<Membership>, sqlx::Error> {
        let row = match org {
            OrgRef::Id(id) => {
                sqlx::query(MEMBERSHIP_BY_ID)
                    .bind(user_id)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            OrgRef::Slug(slug) => {
                sqlx::query(MEMBERSHIP_BY_SLUG)
                    .bind(user_id)
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.map(|row| {
            let role: String = row.try_get("role")?;
            let role = OrgRole::from_str(&role).map_err(|e| sqlx::Error::ColumnDecode {
                index: "role".into(),
                source: Box::new(e),
            })?;
            Ok(Membership {
                role,
                org: Organization {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    slug: row.try_get("slug")?,
                    created_at: row.try_get("created_at")?,
                },
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_uuid_and_slug() {
        let id = Uuid::new_v4();
        assert_eq!(OrgRef::parse(&id.to_string()).unwrap(), OrgRef::Id(id));
        assert_eq!(
            OrgRef::parse("acme").unwrap(),
            OrgRef::Slug("acme".to_string())
        );
    }

    #[test]
    fn parse_rejects_empty_identifiers() {
        assert!(OrgRef::parse("").is_err());
        assert!(OrgRef::parse("   ").is_err());
    }

    #[test]
    fn parse_trims_surrounding_whitespace() {
        assert_eq!(
            OrgRef::parse(" acme ").unwrap(),
            OrgRef::Slug("acme".to_string())
        );
    }
}
