//! Preference cookie model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How long a preference lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieLifetime {
    /// Gone when the process exits.
    Session,

    /// Kept in the local store for ten years.
    Permanent,
}

/// A stored preference row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Preference {
    pub name: String,
    pub value: String,

    /// Unix timestamp after which the preference reads as absent.
    pub expires_at: i64,
}

impl Preference {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}
