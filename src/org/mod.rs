// Organization-scoped authorization: role hierarchy, membership resolution,
// and the per-request gate every protected handler goes through.

pub mod context;
pub mod gate;
pub mod role;

pub use context::{InvalidOrgRef, Membership, MembershipStore, OrgContext, OrgRef, PgMembershipStore};
pub use gate::{require_role, resolve_org, OrgAccessError};
pub use role::{OrgRole, RoleParseError};
