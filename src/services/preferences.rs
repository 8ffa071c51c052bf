//! Cookie-style preferences.
//!
//! Session preferences live in memory and vanish with the process;
//! permanent ones are written to the local store with a ten-year expiry.
//! Like cookies, a name holds one value: writing it with one lifetime
//! replaces any value stored with the other.

use crate::db::pool::DbPool;
use crate::db::preferences as queries;
use crate::error::AppError;
use crate::models::CookieLifetime;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Last namespace the user browsed.
pub const LAST_NAMESPACE: &str = "quay.namespace.last";

/// Whether build logs show timestamps.
pub const BUILD_LOG_TIMESTAMPS: &str = "quay.build.logs.timestamps";

/// Creation time (ms) of the newest notification already reported.
pub const NOTIFICATIONS_MOST_RECENT: &str = "quay.notifications.mostRecentTimestamp";

/// Lifetime of a permanent preference.
pub const PERMANENT_LIFETIME_DAYS: i64 = 365 * 10;

/// Preference store shared across views.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    pool: DbPool,
    session: Arc<RwLock<HashMap<String, String>>>,
}

impl PreferenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            session: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a value for the lifetime of this process.
    pub async fn put_session(&self, name: &str, value: &str) -> Result<(), AppError> {
        validate_name(name)?;

        queries::delete_preference(&self.pool, name).await?;
        self.session
            .write()
            .await
            .insert(name.to_string(), value.to_string());

        log::debug!("[prefs] Set session preference '{}'", name);
        Ok(())
    }

    /// Store a value that survives restarts for ten years.
    pub async fn put_permanent(&self, name: &str, value: &str) -> Result<(), AppError> {
        validate_name(name)?;

        let expires_at = (Utc::now() + chrono::Duration::days(PERMANENT_LIFETIME_DAYS)).timestamp();
        queries::upsert_preference(&self.pool, name, value, expires_at).await?;
        self.session.write().await.remove(name);

        log::debug!("[prefs] Set permanent preference '{}'", name);
        Ok(())
    }

    /// Store with an explicit lifetime.
    pub async fn put(&self, name: &str, value: &str, lifetime: CookieLifetime) -> Result<(), AppError> {
        match lifetime {
            CookieLifetime::Session => self.put_session(name, value).await,
            CookieLifetime::Permanent => self.put_permanent(name, value).await,
        }
    }

    /// Current value, if any. Expired permanent values are removed.
    pub async fn get(&self, name: &str) -> Result<Option<String>, AppError> {
        if let Some(value) = self.session.read().await.get(name) {
            return Ok(Some(value.clone()));
        }

        let Some(preference) = queries::get_preference(&self.pool, name).await? else {
            return Ok(None);
        };

        if preference.is_expired(Utc::now().timestamp()) {
            log::debug!("[prefs] Preference '{}' expired", name);
            queries::delete_preference(&self.pool, name).await?;
            return Ok(None);
        }

        Ok(Some(preference.value))
    }

    /// Remove a value of either lifetime.
    pub async fn clear(&self, name: &str) -> Result<(), AppError> {
        self.session.write().await.remove(name);
        queries::delete_preference(&self.pool, name).await?;
        Ok(())
    }

    /// Drop expired permanent values. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let removed = queries::purge_expired(&self.pool, Utc::now().timestamp()).await?;
        if removed > 0 {
            log::info!("[prefs] Purged {} expired preferences", removed);
        }
        Ok(removed)
    }

    // Typed helpers

    pub async fn last_namespace(&self) -> Result<Option<String>, AppError> {
        self.get(LAST_NAMESPACE).await
    }

    pub async fn set_last_namespace(&self, namespace: &str) -> Result<(), AppError> {
        self.put_permanent(LAST_NAMESPACE, namespace).await
    }

    /// Build-log timestamps are shown unless turned off.
    pub async fn build_log_timestamps(&self) -> Result<bool, AppError> {
        Ok(self.get(BUILD_LOG_TIMESTAMPS).await?.as_deref() != Some("false"))
    }

    pub async fn set_build_log_timestamps(&self, enabled: bool) -> Result<(), AppError> {
        self.put_permanent(BUILD_LOG_TIMESTAMPS, if enabled { "true" } else { "false" })
            .await
    }

    /// Creation time (ms) of the newest notification already seen.
    ///
    /// An unparseable value reads as unset.
    pub async fn notifications_most_recent(&self) -> Result<Option<i64>, AppError> {
        Ok(self
            .get(NOTIFICATIONS_MOST_RECENT)
            .await?
            .and_then(|v| v.parse::<i64>().ok()))
    }

    pub async fn set_notifications_most_recent(&self, millis: i64) -> Result<(), AppError> {
        self.put_permanent(NOTIFICATIONS_MOST_RECENT, &millis.to_string())
            .await
    }
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            "Preference name cannot be empty",
            "name",
        ));
    }
    Ok(())
}
