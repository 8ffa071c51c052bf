//! User notification model.

use crate::services::table::TableRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A notification addressed to the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification UUID.
    pub id: String,

    /// Organization the notification is about, if any.
    pub organization: Option<String>,

    /// Kind name, e.g. `build_failure` or `expiring_license`.
    pub kind: String,

    /// RFC 2822 creation date.
    pub created: String,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default)]
    pub dismissed: bool,
}

/// Display level of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Primary,
    Info,
    Warning,
    Error,
}

/// Kinds the user may dismiss. Everything else (invites, plan and
/// maintenance notices, key approvals, unknown kinds) stays until resolved.
const DISMISSABLE_KINDS: &[&str] = &[
    "test_notification",
    "repo_push",
    "repo_mirror_sync_started",
    "repo_mirror_sync_success",
    "repo_mirror_sync_failed",
    "build_queued",
    "build_start",
    "build_success",
    "build_failure",
    "build_cancelled",
    "vulnerability_found",
];

impl Notification {
    /// Creation time in milliseconds since the epoch.
    pub fn created_millis(&self) -> Option<i64> {
        super::parse_api_date(&self.created).map(|dt| dt.timestamp_millis())
    }

    pub fn can_dismiss(&self) -> bool {
        DISMISSABLE_KINDS.contains(&self.kind.as_str())
    }

    pub fn level(&self) -> NotificationLevel {
        match self.kind.as_str() {
            "test_notification" | "org_team_invite" | "service_key_submitted" => {
                NotificationLevel::Primary
            }
            "password_required" | "over_private_usage" | "build_failure" => {
                NotificationLevel::Error
            }
            "maintenance" => NotificationLevel::Warning,
            "vulnerability_found" => self.vulnerability_level(),
            _ => NotificationLevel::Info,
        }
    }

    /// Level from `metadata.vulnerability.priority`.
    fn vulnerability_level(&self) -> NotificationLevel {
        let priority = self
            .metadata
            .pointer("/vulnerability/priority")
            .and_then(|p| p.as_str())
            .unwrap_or_default();

        match priority {
            "Defcon1" | "Critical" | "High" => NotificationLevel::Error,
            "Medium" => NotificationLevel::Warning,
            _ => NotificationLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,

    /// More notifications exist than were returned.
    #[serde(default)]
    pub additional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationField {
    Kind,
    Organization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationColumn {
    Kind,
    Created,
}

impl TableRow for Notification {
    type Field = NotificationField;
    type Column = NotificationColumn;

    fn field_value(&self, field: NotificationField) -> Option<&str> {
        match field {
            NotificationField::Kind => Some(&self.kind),
            NotificationField::Organization => self.organization.as_deref(),
        }
    }

    fn compare_by(&self, other: &Self, column: NotificationColumn) -> Ordering {
        match column {
            NotificationColumn::Kind => self.kind.cmp(&other.kind),
            NotificationColumn::Created => self.created_millis().cmp(&other.created_millis()),
        }
    }

    fn row_id(&self) -> String {
        self.id.clone()
    }
}
