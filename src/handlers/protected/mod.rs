// Protected handlers: every route here sits behind the JWT middleware, and
// every org-scoped route re-resolves the caller's membership through
// `org_gate` before touching tenant data.

pub mod audit;
pub mod auth;
pub mod members;
pub mod orgs;
pub mod tags;
pub mod tickets;

use sqlx::PgPool;

use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::org::{require_role, OrgContext, OrgRef, OrgRole, PgMembershipStore};

/// Resolve the caller's organization context and enforce an optional minimum
/// role. Runs fresh on every request; nothing here is cached.
pub(crate) async fn org_gate(
    user: &AuthUser,
    org_param: &str,
    minimum: Option<OrgRole>,
) -> Result<(OrgContext, PgPool), ApiError> {
    let org_ref = OrgRef::parse(org_param)?;
    let pool = DatabaseManager::pool().await?;
    let store = PgMembershipStore::new(pool.clone());
    let ctx = require_role(&store, Some(user), &org_ref, minimum).await?;
    Ok((ctx, pool))
}

/// Clamp a caller-supplied page size to the configured bounds.
pub(crate) fn clamp_limit(requested: Option<i64>) -> i64 {
    let api = &config::config().api;
    requested
        .unwrap_or(api.default_list_limit)
        .clamp(1, api.max_list_limit)
}
