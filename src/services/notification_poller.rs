//! Background notification polling.
//!
//! Fetches the user's notifications every few minutes while the page is
//! visible, keeps the notification list cache current and reports the
//! notifications that arrived since the last report. The last reported
//! creation time is kept as a permanent preference so a restart does not
//! report the same notifications again.

use crate::error::AppError;
use crate::models::Notification;
use crate::services::poll_channel::{PollChannel, PollOutcome};
use crate::services::preferences::PreferenceStore;
use crate::services::query_cache::QueryCache;
use crate::services::registry_client::RegistryClient;
use crate::services::resource_hooks::keys;
use crate::services::view_scope::ViewScope;
use crate::services::visibility::VisibilityTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Capacity of the "new notifications" channel.
const NEW_NOTIFICATIONS_BUFFER: usize = 16;

/// Result of comparing a fetched list with the last reported timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotifications {
    /// Undismissed notifications created after the marker, oldest first.
    pub fresh: Vec<Notification>,

    /// Value the marker should move to.
    pub marker: Option<i64>,
}

/// Split out notifications created after `marker` (ms since epoch).
///
/// Without a marker nothing is reported; the marker starts at the newest
/// notification so only later arrivals count as new.
pub fn new_since(notifications: &[Notification], marker: Option<i64>) -> NewNotifications {
    let newest = notifications
        .iter()
        .filter_map(Notification::created_millis)
        .max();

    let Some(marker) = marker else {
        return NewNotifications {
            fresh: Vec::new(),
            marker: newest,
        };
    };

    let mut fresh: Vec<Notification> = notifications
        .iter()
        .filter(|n| !n.dismissed)
        .filter(|n| n.created_millis().is_some_and(|created| created > marker))
        .cloned()
        .collect();
    fresh.sort_by_key(|n| n.created_millis());

    NewNotifications {
        fresh,
        marker: Some(newest.map_or(marker, |newest| newest.max(marker))),
    }
}

#[derive(Clone)]
struct PollContext {
    client: RegistryClient,
    prefs: PreferenceStore,
    cache: QueryCache,
    latest: Arc<watch::Sender<Vec<Notification>>>,
    new_tx: mpsc::Sender<Vec<Notification>>,
}

impl PollContext {
    async fn poll_once(self) -> PollOutcome {
        let list = match self.client.list_notifications().await {
            Ok(list) => list,
            Err(err @ AppError::Authentication { .. }) => {
                log::warn!("[notifications] Stopping: {}", err);
                return PollOutcome::Stop;
            }
            Err(err) => {
                log::warn!("[notifications] Fetch failed, will retry: {}", err);
                return PollOutcome::Continue;
            }
        };

        log::debug!(
            "[notifications] Fetched {} notifications",
            list.notifications.len()
        );
        self.cache
            .set_data(&keys::notifications(), list.notifications.clone());
        self.latest.send_replace(list.notifications.clone());

        if let Err(err) = self.report_new(&list.notifications).await {
            log::warn!("[notifications] Could not update last-seen marker: {}", err);
        }

        PollOutcome::Continue
    }

    async fn report_new(&self, notifications: &[Notification]) -> Result<(), AppError> {
        let marker = self.prefs.notifications_most_recent().await?;
        let result = new_since(notifications, marker);

        if let Some(next) = result.marker.filter(|next| Some(*next) != marker) {
            self.prefs.set_notifications_most_recent(next).await?;
        }

        if !result.fresh.is_empty() {
            log::info!(
                "[notifications] {} new notification(s)",
                result.fresh.len()
            );
            if let Err(err) = self.new_tx.try_send(result.fresh) {
                log::warn!("[notifications] Dropped new notifications: {}", err);
            }
        }

        Ok(())
    }
}

/// Notification poller bound to a view.
pub struct NotificationPoller {
    channel: PollChannel,
    latest: watch::Receiver<Vec<Notification>>,
}

impl NotificationPoller {
    /// Create a stopped poller.
    ///
    /// Returns the poller and the receiver of newly arrived notifications.
    pub fn new(
        scope: &ViewScope,
        visibility: VisibilityTracker,
        client: RegistryClient,
        prefs: PreferenceStore,
        cache: QueryCache,
        interval: Duration,
    ) -> (Self, mpsc::Receiver<Vec<Notification>>) {
        let (latest_tx, latest) = watch::channel(Vec::new());
        let (new_tx, new_rx) = mpsc::channel(NEW_NOTIFICATIONS_BUFFER);

        let context = PollContext {
            client,
            prefs,
            cache,
            latest: Arc::new(latest_tx),
            new_tx,
        };

        let channel = PollChannel::new(scope, visibility, interval, move || {
            context.clone().poll_once()
        });

        (Self { channel, latest }, new_rx)
    }

    pub fn start(&mut self) {
        self.channel.start();
    }

    pub fn stop(&mut self) {
        self.channel.stop();
    }

    /// Most recently fetched list.
    pub fn latest(&self) -> watch::Receiver<Vec<Notification>> {
        self.latest.clone()
    }

    pub fn channel(&self) -> &PollChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut PollChannel {
        &mut self.channel
    }
}
