//! Registry Console - client core for a container registry web console.
//!
//! Holds everything below the view layer: configuration, the registry API
//! client, the query cache, cookie-style preferences and the background
//! pollers that keep views current while they are mounted and visible.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use crate::config::ConsoleConfig;
use crate::error::AppError;
use crate::models::Notification;
use crate::services::build_watcher::{BuildRef, BuildWatcher};
use crate::services::notification_poller::NotificationPoller;
use crate::services::poll_channel::PollState;
use crate::services::preferences::PreferenceStore;
use crate::services::query_cache::QueryCache;
use crate::services::registry_client::{RegistryClient, RegistryClientConfig};
use crate::services::resource_hooks::ResourceHooks;
use crate::services::view_scope::ViewScope;
use crate::services::visibility::{visibility_channel, VisibilitySource, VisibilityTracker};
use std::path::Path;
use tokio::sync::mpsc;

/// Shared state of one console session.
pub struct Console {
    pub config: ConsoleConfig,
    pub client: RegistryClient,
    pub cache: QueryCache,
    pub prefs: PreferenceStore,
    pub hooks: ResourceHooks,
    visibility: VisibilitySource,
}

impl Console {
    /// Open the local store and build the client from `config`.
    pub async fn open(config: ConsoleConfig, data_dir: &Path) -> Result<Self, AppError> {
        let db_path = config.database_path(data_dir);
        let pool = db::initialize(&db_path).await?;
        log::info!("[console] Local store at {}", db_path.display());

        let client = RegistryClient::new(RegistryClientConfig::from_console(&config)?)?;
        let cache = QueryCache::new();
        let prefs = PreferenceStore::new(pool);
        prefs.purge_expired().await?;

        let hooks = ResourceHooks::new(client.clone(), cache.clone());
        let (visibility, _) = visibility_channel();

        Ok(Self {
            config,
            client,
            cache,
            prefs,
            hooks,
            visibility,
        })
    }

    /// Host side of page visibility.
    pub fn visibility(&self) -> &VisibilitySource {
        &self.visibility
    }

    pub fn visibility_tracker(&self) -> VisibilityTracker {
        self.visibility.tracker()
    }

    /// Notification poller for `scope`, using the configured interval.
    pub fn notification_poller(
        &self,
        scope: &ViewScope,
    ) -> (NotificationPoller, mpsc::Receiver<Vec<Notification>>) {
        NotificationPoller::new(
            scope,
            self.visibility_tracker(),
            self.client.clone(),
            self.prefs.clone(),
            self.cache.clone(),
            self.config.notification_interval(),
        )
    }

    pub fn build_watcher(&self, scope: &ViewScope, build: BuildRef) -> BuildWatcher {
        BuildWatcher::new(
            scope,
            self.visibility_tracker(),
            self.client.clone(),
            build,
            self.config.build_poll_interval(),
        )
    }
}

/// Run the console headless: poll notifications and log new ones until
/// Ctrl-C.
///
/// Returns an authentication error when the registry rejects the token,
/// since the notification poller stops for good at that point.
pub async fn run(config_path: &Path, data_dir: &Path) -> Result<(), AppError> {
    let config = ConsoleConfig::load(config_path)?;
    let console = Console::open(config, data_dir).await?;

    let scope = ViewScope::new("notifications");
    let (mut poller, mut new_notifications) = console.notification_poller(&scope);
    poller.start();
    let mut states = poller.channel().watch_state();

    log::info!(
        "[console] Watching notifications on {} every {:?}",
        console.client.base_url(),
        console.config.notification_interval()
    );

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("[console] Shutting down");
                break Ok(());
            }
            _ = states.wait_for(|state| *state == PollState::Idle) => {
                break Err(AppError::authentication(
                    "Notification polling stopped: the registry rejected the token",
                ));
            }
            Some(batch) = new_notifications.recv() => {
                for notification in batch {
                    log::info!(
                        "[console] New notification: {} ({}) at {}",
                        notification.kind,
                        notification.organization.as_deref().unwrap_or("personal"),
                        notification.created
                    );
                }
            }
        }
    };

    scope.end();
    result
}
