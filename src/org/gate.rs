use thiserror::Error;

use crate::middleware::AuthUser;
use crate::org::context::{MembershipStore, OrgContext, OrgRef};
use crate::org::role::OrgRole;

/// Outcome taxonomy for organization-scoped authorization.
///
/// `NotAMember` deliberately covers "organization does not exist" as well,
/// so responses never reveal tenant existence to outsiders. Store faults stay
/// a distinct variant and must never degrade into a permission answer.
#[derive(Debug, Error)]
pub enum OrgAccessError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("no membership in the requested organization")]
    NotAMember,

    #[error("requires {required} role, caller has {actual}")]
    Forbidden { required: OrgRole, actual: OrgRole },

    #[error("membership lookup failed")]
    Upstream(#[source] sqlx::Error),
}

/// Resolve the caller's context in one organization.
///
/// Reads the freshest membership on every call: a role change or removal is
/// visible on the very next request, and the result must not be cached
/// beyond the current request.
pub async fn resolve_org(
    store: &dyn MembershipStore,
    user: Option<&AuthUser>,
    org: &OrgRef,
) -> Result<OrgContext, OrgAccessError> {
    let user = user.ok_or(OrgAccessError::Unauthenticated)?;

    let membership = store
        .find_membership(user.id, org)
        .await
        .map_err(OrgAccessError::Upstream)?
        .ok_or(OrgAccessError::NotAMember)?;

    Ok(OrgContext {
        user: user.clone(),
        role: membership.role,
        org: membership.org,
    })
}

/// Authorization gate for protected operations: resolve the caller's
/// context, then enforce an optional minimum role before the handler touches
/// any tenant data.
pub async fn require_role(
    store: &dyn MembershipStore,
    user: Option<&AuthUser>,
    org: &OrgRef,
    minimum: Option<OrgRole>,
) -> Result<OrgContext, OrgAccessError> {
    let ctx = resolve_org(store, user, org).await?;

    if let Some(required) = minimum {
        if !ctx.role.is_at_least(required) {
            tracing::warn!(
                user = %ctx.user.id,
                org = %ctx.org.id,
                role = %ctx.role,
                required = %required,
                "organization access denied"
            );
            return Err(OrgAccessError::Forbidden {
                required,
                actual: ctx.role,
            });
        }
    }

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::database::models::Organization;
    use crate::org::context::Membership;

    /// In-memory membership store keyed by (user, slug). Mutable behind a
    /// lock so tests can change roles between calls.
    struct FakeStore {
        memberships: Mutex<HashMap<(Uuid, String), (OrgRole, Organization)>>,
        fail: bool,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                memberships: Mutex::new(HashMap::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                memberships: Mutex::new(HashMap::new()),
                fail: true,
            }
        }

        fn grant(&self, user_id: Uuid, slug: &str, role: OrgRole) -> Organization {
            let org = Organization {
                id: Uuid::new_v4(),
                name: slug.to_string(),
                slug: slug.to_string(),
                created_at: Utc::now(),
            };
            self.memberships
                .lock()
                .unwrap()
                .insert((user_id, slug.to_string()), (role, org.clone()));
            org
        }

        fn set_role(&self, user_id: Uuid, slug: &str, role: OrgRole) {
            let mut map = self.memberships.lock().unwrap();
            if let Some(entry) = map.get_mut(&(user_id, slug.to_string())) {
                entry.0 = role;
            }
        }

        fn revoke(&self, user_id: Uuid, slug: &str) {
            self.memberships
                .lock()
                .unwrap()
                .remove(&(user_id, slug.to_string()));
        }
    }

    #[async_trait]
    impl MembershipStore for FakeStore {
        async fn find_membership(
            &self,
            user_id: Uuid,
            org: &OrgRef,
        ) -> Result<Option<Membership>, sqlx::Error> {
            if self.fail {
                return Err(sqlx::Error::PoolClosed);
            }
            let map = self.memberships.lock().unwrap();
            let found = match org {
                OrgRef::Slug(slug) => map.get(&(user_id, slug.clone())).cloned(),
                OrgRef::Id(id) => map
                    .iter()
                    .find(|((u, _), (_, o))| *u == user_id && o.id == *id)
                    .map(|(_, entry)| entry.clone()),
            };
            Ok(found.map(|(role, org)| Membership { role, org }))
        }
    }

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "u1@example.com".to_string(),
            name: "U One".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_identity_is_unauthenticated_regardless_of_org() {
        let store = FakeStore::new();
        store.grant(Uuid::new_v4(), "acme", OrgRole::Owner);

        for org in ["acme", "no-such-org"] {
            let err = resolve_org(&store, None, &OrgRef::parse(org).unwrap())
                .await
                .unwrap_err();
            assert!(matches!(err, OrgAccessError::Unauthenticated));
        }
    }

    #[tokio::test]
    async fn unknown_org_and_non_membership_are_indistinguishable() {
        let store = FakeStore::new();
        let caller = user();
        // "acme" exists (another user is a member); "ghost" does not.
        store.grant(Uuid::new_v4(), "acme", OrgRole::Owner);

        let existing = resolve_org(&store, Some(&caller), &OrgRef::parse("acme").unwrap())
            .await
            .unwrap_err();
        let missing = resolve_org(&store, Some(&caller), &OrgRef::parse("ghost").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(existing, OrgAccessError::NotAMember));
        assert!(matches!(missing, OrgAccessError::NotAMember));
    }

    #[tokio::test]
    async fn member_below_minimum_is_forbidden() {
        let store = FakeStore::new();
        let caller = user();
        store.grant(caller.id, "acme", OrgRole::Member);
        let org = OrgRef::parse("acme").unwrap();

        let err = require_role(&store, Some(&caller), &org, Some(OrgRole::Admin))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrgAccessError::Forbidden {
                required: OrgRole::Admin,
                actual: OrgRole::Member,
            }
        ));

        // The same membership satisfies its own level and anything below.
        for minimum in [OrgRole::Member, OrgRole::Viewer] {
            let ctx = require_role(&store, Some(&caller), &org, Some(minimum))
                .await
                .unwrap();
            assert_eq!(ctx.role, OrgRole::Member);
        }
    }

    #[tokio::test]
    async fn owner_passes_admin_gate() {
        let store = FakeStore::new();
        let caller = user();
        store.grant(caller.id, "acme", OrgRole::Owner);

        let ctx = require_role(
            &store,
            Some(&caller),
            &OrgRef::parse("acme").unwrap(),
            Some(OrgRole::Admin),
        )
        .await
        .unwrap();
        assert_eq!(ctx.role, OrgRole::Owner);
        assert_eq!(ctx.org.slug, "acme");
    }

    #[tokio::test]
    async fn viewer_cannot_reach_member_management() {
        let store = FakeStore::new();
        let caller = user();
        store.grant(caller.id, "acme", OrgRole::Viewer);

        let err = require_role(
            &store,
            Some(&caller),
            &OrgRef::parse("acme").unwrap(),
            Some(OrgRole::Admin),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OrgAccessError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn repeated_resolution_yields_equal_contexts() {
        let store = FakeStore::new();
        let caller = user();
        store.grant(caller.id, "acme", OrgRole::Admin);
        let org = OrgRef::parse("acme").unwrap();

        let first = resolve_org(&store, Some(&caller), &org).await.unwrap();
        let second = resolve_org(&store, Some(&caller), &org).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn role_changes_are_visible_on_the_next_resolution() {
        let store = FakeStore::new();
        let caller = user();
        store.grant(caller.id, "acme", OrgRole::Member);
        let org = OrgRef::parse("acme").unwrap();

        let before = resolve_org(&store, Some(&caller), &org).await.unwrap();
        assert_eq!(before.role, OrgRole::Member);

        store.set_role(caller.id, "acme", OrgRole::Admin);
        let after = resolve_org(&store, Some(&caller), &org).await.unwrap();
        assert_eq!(after.role, OrgRole::Admin);

        store.revoke(caller.id, "acme");
        let removed = resolve_org(&store, Some(&caller), &org).await.unwrap_err();
        assert!(matches!(removed, OrgAccessError::NotAMember));
    }

    #[tokio::test]
    async fn store_failure_is_upstream_not_a_permission_answer() {
        let store = FakeStore::failing();
        let caller = user();

        let err = require_role(
            &store,
            Some(&caller),
            &OrgRef::parse("acme").unwrap(),
            Some(OrgRole::Viewer),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OrgAccessError::Upstream(_)));
    }
}
