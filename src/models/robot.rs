//! Robot account model.

use crate::services::table::TableRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A robot account of an organization or user namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Robot {
    /// Full name, `namespace+shortname`.
    pub name: String,

    pub created: Option<String>,
    pub last_accessed: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub teams: Vec<serde_json::Value>,

    #[serde(default)]
    pub repositories: Vec<String>,
}

impl Robot {
    /// Name without the namespace prefix.
    pub fn shortname(&self) -> &str {
        self.name
            .split_once('+')
            .map(|(_, short)| short)
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotList {
    pub robots: Vec<Robot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotField {
    Name,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotColumn {
    Name,
    Created,
    LastAccessed,
}

impl TableRow for Robot {
    type Field = RobotField;
    type Column = RobotColumn;

    fn field_value(&self, field: RobotField) -> Option<&str> {
        match field {
            RobotField::Name => Some(&self.name),
            RobotField::Description => Some(&self.description),
        }
    }

    fn compare_by(&self, other: &Self, column: RobotColumn) -> Ordering {
        match column {
            RobotColumn::Name => self.name.cmp(&other.name),
            RobotColumn::Created => {
                super::compare_api_dates(self.created.as_deref(), other.created.as_deref())
            }
            RobotColumn::LastAccessed => super::compare_api_dates(
                self.last_accessed.as_deref(),
                other.last_accessed.as_deref(),
            ),
        }
    }

    fn row_id(&self) -> String {
        self.name.clone()
    }
}
