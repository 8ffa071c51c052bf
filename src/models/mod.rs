//! Data models for registry entities.
//!
//! These are transient projections of the registry API's JSON. Nothing
//! here is persisted except [`Preference`]. Collection models implement
//! [`TableRow`](crate::services::table::TableRow) so views can search,
//! sort and select them.

pub mod build;
pub mod notification;
pub mod organization;
pub mod preference;
pub mod repository;
pub mod robot;
pub mod tag;

pub use build::{Build, BuildColumn, BuildField, BuildList, BuildPhase};
pub use notification::{
    Notification, NotificationColumn, NotificationField, NotificationLevel, NotificationList,
};
pub use organization::{Avatar, Organization};
pub use preference::{CookieLifetime, Preference};
pub use repository::{Repository, RepositoryColumn, RepositoryField, RepositoryPage};
pub use robot::{Robot, RobotColumn, RobotField, RobotList};
pub use tag::{Manifest, Tag, TagColumn, TagField, TagsPage};

use chrono::{DateTime, FixedOffset};

/// Parse a date as the registry API formats it.
///
/// The API emits RFC 2822 (`Tue, 14 May 2024 10:00:00 -0000`); a few
/// endpoints use RFC 3339.
pub fn parse_api_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

/// Compare two optional API dates; unparseable or missing sorts first.
pub(crate) fn compare_api_dates(a: Option<&str>, b: Option<&str>) -> std::cmp::Ordering {
    let a = a.and_then(parse_api_date);
    let b = b.and_then(parse_api_date);
    a.cmp(&b)
}
