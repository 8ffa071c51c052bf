//! Repository build model.

use crate::services::table::TableRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Phase of a repository build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPhase {
    Error,
    #[serde(rename = "internalerror")]
    InternalError,
    BuildScheduled,
    Unpacking,
    Pulling,
    Building,
    Pushing,
    Waiting,
    Complete,
    Cancelled,
    Expired,
    #[serde(rename = "cannot_load")]
    CannotLoad,
    Starting,
    Initializing,
    CheckingCache,
    PrimingCache,
    Incomplete,
}

impl BuildPhase {
    /// A build in a terminal phase will never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Error | Self::InternalError | Self::Cancelled | Self::Expired
        )
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = serde_json::to_value(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", value.as_str().unwrap_or("unknown"))
    }
}

/// Repository a build belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRepository {
    pub namespace: String,
    pub name: String,
}

/// A repository build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    /// Build UUID.
    pub id: String,

    pub phase: BuildPhase,

    /// RFC 2822 start date.
    pub started: Option<String>,

    pub display_name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub manual_user: Option<String>,

    #[serde(default)]
    pub is_writer: bool,

    pub repository: BuildRepository,

    /// Builder status payload; its shape depends on the phase.
    #[serde(default)]
    pub status: serde_json::Value,

    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildList {
    pub builds: Vec<Build>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildField {
    DisplayName,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildColumn {
    Started,
    Phase,
}

impl TableRow for Build {
    type Field = BuildField;
    type Column = BuildColumn;

    fn field_value(&self, field: BuildField) -> Option<&str> {
        match field {
            BuildField::DisplayName => Some(&self.display_name),
            BuildField::Id => Some(&self.id),
        }
    }

    fn compare_by(&self, other: &Self, column: BuildColumn) -> Ordering {
        match column {
            BuildColumn::Started => {
                super::compare_api_dates(self.started.as_deref(), other.started.as_deref())
            }
            BuildColumn::Phase => self.phase.to_string().cmp(&other.phase.to_string()),
        }
    }

    fn row_id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        let phases: Vec<BuildPhase> = serde_json::from_str(
            r#"["build-scheduled", "internalerror", "cannot_load", "checking-cache", "complete"]"#,
        )
        .unwrap();

        assert_eq!(
            phases,
            vec![
                BuildPhase::BuildScheduled,
                BuildPhase::InternalError,
                BuildPhase::CannotLoad,
                BuildPhase::CheckingCache,
                BuildPhase::Complete,
            ]
        );
        assert_eq!(BuildPhase::PrimingCache.to_string(), "priming-cache");
    }

    #[test]
    fn test_terminal_phases() {
        assert!(BuildPhase::Complete.is_terminal());
        assert!(BuildPhase::InternalError.is_terminal());
        assert!(BuildPhase::Expired.is_terminal());
        assert!(!BuildPhase::Building.is_terminal());
        assert!(!BuildPhase::Waiting.is_terminal());
    }
}
