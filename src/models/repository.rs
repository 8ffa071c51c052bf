//! Repository model.

use crate::services::table::TableRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A repository as listed under a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub namespace: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,

    /// `image` or `application`.
    #[serde(default = "default_kind")]
    pub kind: String,

    /// `NORMAL`, `READ_ONLY` or `MIRROR`.
    pub state: Option<String>,

    /// Unix timestamp, only present when requested.
    pub last_modified: Option<i64>,

    pub popularity: Option<f64>,
    pub is_starred: Option<bool>,
}

fn default_kind() -> String {
    "image".to_string()
}

impl Repository {
    /// `namespace/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// One page of the repository listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,

    /// Opaque token for the next page.
    pub next_page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryField {
    Name,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryColumn {
    Name,
    Visibility,
    LastModified,
}

impl TableRow for Repository {
    type Field = RepositoryField;
    type Column = RepositoryColumn;

    fn field_value(&self, field: RepositoryField) -> Option<&str> {
        match field {
            RepositoryField::Name => Some(&self.name),
            RepositoryField::Description => self.description.as_deref(),
        }
    }

    fn compare_by(&self, other: &Self, column: RepositoryColumn) -> Ordering {
        match column {
            RepositoryColumn::Name => self.name.cmp(&other.name),
            RepositoryColumn::Visibility => self.is_public.cmp(&other.is_public),
            RepositoryColumn::LastModified => self.last_modified.cmp(&other.last_modified),
        }
    }

    fn row_id(&self) -> String {
        self.full_name()
    }
}
