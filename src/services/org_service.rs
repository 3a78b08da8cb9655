use sqlx::PgPool;
use uuid::Uuid;

use crate::database::is_unique_violation;
use crate::database::models::{MemberView, Organization, OrgMembershipView};
use crate::org::{OrgContext, OrgRole};
use crate::services::audit_service;

#[derive(Debug, thiserror::Error)]
pub enum OrgError {
    #[error("target user not registered")]
    UserNotFound,
    #[error("user is already a member")]
    AlreadyMember,
    #[error("membership not found")]
    MembershipNotFound,
    #[error("organization would be left without an owner")]
    LastOwner,
    #[error("owner memberships can only be changed by an owner")]
    OwnerProtected,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct OrgService {
    pool: PgPool,
}

impl OrgService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Organizations the user belongs to, oldest membership first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrgMembershipView>, OrgError> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, chrono::DateTime<chrono::Utc>, String, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT o.id, o.name, o.slug, o.created_at, m.role, m.created_at AS joined_at
            FROM org_memberships m
            JOIN organizations o ON o.id = m.org_id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, slug, created_at, role, joined_at)| OrgMembershipView {
                org: Organization {
                    id,
                    name,
                    slug,
                    created_at,
                },
                role,
                joined_at,
            })
            .collect())
    }

    /// Create an organization and its OWNER membership atomically.
    pub async fn create(&self, name: &str, owner_id: Uuid) -> Result<Organization, OrgError> {
        let slug = self.available_slug(name).await?;

        let mut tx = self.pool.begin().await?;

        let org = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, slug)
            VALUES ($1, $2)
            RETURNING id, name, slug, created_at
            "#,
        )
        .bind(name)
        .bind(&slug)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO org_memberships (org_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(org.id)
            .bind(owner_id)
            .bind(OrgRole::Owner.as_str())
            .execute(&mut *tx)
            .await?;

        audit_service::record(
            &mut *tx,
            org.id,
            Some(owner_id),
            "org.created",
            "organization",
            Some(org.id),
        )
        .await?;

        tx.commit().await?;
        Ok(org)
    }

    /// Delete an organization. The caller must already hold the OWNER gate.
    pub async fn delete(&self, ctx: &OrgContext) -> Result<(), OrgError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(ctx.org.id)
            .execute(&mut *tx)
            .await?;

        // The trail outlives the organization: audit_logs carries no FK.
        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "org.deleted",
            "organization",
            Some(ctx.org.id),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn counts(&self, org_id: Uuid) -> Result<(i64, i64), OrgError> {
        let tickets = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool);
        let members =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM org_memberships WHERE org_id = $1")
                .bind(org_id)
                .fetch_one(&self.pool);

        let (tickets, members) = futures::try_join!(tickets, members)?;
        Ok((tickets, members))
    }

    pub async fn members(&self, org_id: Uuid) -> Result<Vec<MemberView>, OrgError> {
        let members = sqlx::query_as::<_, MemberView>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, m.role, m.created_at AS joined_at
            FROM org_memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Add a member by email. The target must already have an account.
    pub async fn add_member(
        &self,
        ctx: &OrgContext,
        email: &str,
        role: OrgRole,
    ) -> Result<MemberView, OrgError> {
        // Granting OWNER is itself an owner-level action.
        if role == OrgRole::Owner && !ctx.role.is_at_least(OrgRole::Owner) {
            return Err(OrgError::OwnerProtected);
        }

        let email = email.trim().to_lowercase();
        let user = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, name, email FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrgError::UserNotFound)?;

        let mut tx = self.pool.begin().await?;

        let joined_at = sqlx::query_scalar::<_, chrono::DateTime<chrono::Utc>>(
            r#"
            INSERT INTO org_memberships (org_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING created_at
            "#,
        )
        .bind(ctx.org.id)
        .bind(user.0)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                OrgError::AlreadyMember
            } else {
                OrgError::Database(e)
            }
        })?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "member.added",
            "membership",
            Some(user.0),
        )
        .await?;

        tx.commit().await?;

        Ok(MemberView {
            user_id: user.0,
            name: user.1,
            email: user.2,
            role: role.as_str().to_string(),
            joined_at,
        })
    }

    /// Change a member's role, with owner-safety rules: only an owner may
    /// grant or revoke OWNER, and the last owner cannot be demoted.
    pub async fn change_role(
        &self,
        ctx: &OrgContext,
        target_user: Uuid,
        new_role: OrgRole,
    ) -> Result<(), OrgError> {
        let current = self.member_role(ctx.org.id, target_user).await?;

        if (current == OrgRole::Owner || new_role == OrgRole::Owner)
            && !ctx.role.is_at_least(OrgRole::Owner)
        {
            return Err(OrgError::OwnerProtected);
        }
        if current == OrgRole::Owner && new_role != OrgRole::Owner {
            self.ensure_not_last_owner(ctx.org.id).await?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE org_memberships SET role = $1 WHERE org_id = $2 AND user_id = $3")
            .bind(new_role.as_str())
            .bind(ctx.org.id)
            .bind(target_user)
            .execute(&mut *tx)
            .await?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "member.role_changed",
            "membership",
            Some(target_user),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a member, with the same owner-safety rules as role changes.
    pub async fn remove_member(&self, ctx: &OrgContext, target_user: Uuid) -> Result<(), OrgError> {
        let current = self.member_role(ctx.org.id, target_user).await?;

        if current == OrgRole::Owner {
            if !ctx.role.is_at_least(OrgRole::Owner) {
                return Err(OrgError::OwnerProtected);
            }
            self.ensure_not_last_owner(ctx.org.id).await?;
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM org_memberships WHERE org_id = $1 AND user_id = $2")
            .bind(ctx.org.id)
            .bind(target_user)
            .execute(&mut *tx)
            .await?;

        audit_service::record(
            &mut *tx,
            ctx.org.id,
            Some(ctx.user.id),
            "member.removed",
            "membership",
            Some(target_user),
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn member_role(&self, org_id: Uuid, user_id: Uuid) -> Result<OrgRole, OrgError> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM org_memberships WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrgError::MembershipNotFound)?;

        role.parse().map_err(|_| {
            tracing::error!(org = %org_id, user = %user_id, role = %role, "invalid role in store");
            OrgError::Database(sqlx::Error::ColumnDecode {
                index: "role".into(),
                source: "unrecognized role".into(),
            })
        })
    }

    async fn ensure_not_last_owner(&self, org_id: Uuid) -> Result<(), OrgError> {
        let owners = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM org_memberships WHERE org_id = $1 AND role = $2",
        )
        .bind(org_id)
        .bind(OrgRole::Owner.as_str())
        .fetch_one(&self.pool)
        .await?;

        if owners <= 1 {
            return Err(OrgError::LastOwner);
        }
        Ok(())
    }

    /// Derive a unique slug from the display name. Collisions get a short
    /// random suffix.
    async fn available_slug(&self, name: &str) -> Result<String, OrgError> {
        let base = slugify(name);

        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM organizations WHERE slug = $1")
            .bind(&base)
            .fetch_one(&self.pool)
            .await?;

        if taken == 0 {
            return Ok(base);
        }

        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}", base, &suffix[..6]))
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true; // suppress leading dashes

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "org".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Acme -- Corp!  "), "acme-corp");
        assert_eq!(slugify("ACME"), "acme");
    }

    #[test]
    fn slugify_never_returns_empty() {
        assert_eq!(slugify(""), "org");
        assert_eq!(slugify("!!!"), "org");
    }

    #[test]
    fn slugify_preserves_digits() {
        assert_eq!(slugify("Team 42"), "team-42");
    }
}
