use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Organization role, ordered from least to most privileged.
///
/// The declaration order is load-bearing: `Ord` is derived from variant
/// position, and every permission check compares by that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrgRole {
    Viewer,
    Member,
    Admin,
    Owner,
}

#[derive(Debug, Error)]
#[error("unrecognized organization role: {0}")]
pub struct RoleParseError(String);

impl OrgRole {
    /// True iff this role sits at or above `minimum` in the hierarchy.
    pub fn is_at_least(self, minimum: OrgRole) -> bool {
        self >= minimum
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrgRole::Viewer => "VIEWER",
            OrgRole::Member => "MEMBER",
            OrgRole::Admin => "ADMIN",
            OrgRole::Owner => "OWNER",
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgRole {
    type Err = RoleParseError;

    // Rejecting unknown strings here keeps a bad row or payload from ever
    // reaching a comparison.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VIEWER" => Ok(OrgRole::Viewer),
            "MEMBER" => Ok(OrgRole::Member),
            "ADMIN" => Ok(OrgRole::Admin),
            "OWNER" => Ok(OrgRole::Owner),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}
