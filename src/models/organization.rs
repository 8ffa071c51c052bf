//! Organization model.

use serde::{Deserialize, Serialize};

/// Avatar descriptor shared by users, organizations and teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    pub name: String,
    pub hash: String,
    pub color: String,
    pub kind: String,
}

/// An organization as seen by the current user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,

    /// Empty unless the user administers the organization.
    #[serde(default)]
    pub email: String,

    pub avatar: Option<Avatar>,

    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub is_member: bool,

    /// Team names in display order.
    #[serde(default)]
    pub ordered_teams: Vec<String>,

    /// Seconds before a removed tag is garbage collected (admins only).
    pub tag_expiration_s: Option<i64>,
}
