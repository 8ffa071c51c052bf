//! Repository tag and manifest models.

use crate::services::table::TableRow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A tag as returned by the tag history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,

    /// Digest of the manifest the tag points at.
    pub manifest_digest: String,

    #[serde(default)]
    pub is_manifest_list: bool,

    /// RFC 2822 date of the last change.
    pub last_modified: Option<String>,

    #[serde(default)]
    pub reversion: bool,

    /// Compressed size in bytes; absent for manifest lists.
    pub size: Option<i64>,

    pub start_ts: Option<i64>,

    /// Set once the tag is no longer active.
    pub end_ts: Option<i64>,

    /// RFC 2822 date at which the tag expires, if scheduled.
    pub expiration: Option<String>,
}

impl Tag {
    pub fn is_active(&self) -> bool {
        self.end_ts.is_none()
    }
}

/// One page of tag history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsPage {
    pub page: u32,
    pub has_additional: bool,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagField {
    Name,
    Digest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagColumn {
    Name,
    Size,
    LastModified,
}

impl TableRow for Tag {
    type Field = TagField;
    type Column = TagColumn;

    fn field_value(&self, field: TagField) -> Option<&str> {
        match field {
            TagField::Name => Some(&self.name),
            TagField::Digest => Some(&self.manifest_digest),
        }
    }

    fn compare_by(&self, other: &Self, column: TagColumn) -> Ordering {
        match column {
            TagColumn::Name => self.name.cmp(&other.name),
            TagColumn::Size => self.size.cmp(&other.size),
            TagColumn::LastModified => super::compare_api_dates(
                self.last_modified.as_deref(),
                other.last_modified.as_deref(),
            ),
        }
    }

    fn row_id(&self) -> String {
        self.name.clone()
    }
}

/// Manifest looked up by digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub digest: String,
    pub is_manifest_list: bool,

    /// Raw manifest document.
    pub manifest_data: String,

    pub config_media_type: Option<String>,
}

impl Manifest {
    /// Parse the embedded manifest document.
    pub fn document(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.manifest_data)
    }
}
