//! Notification poller and build watcher against the mock registry.

mod common;

use common::MockRegistry;
use registry_console_lib::db;
use registry_console_lib::models::{BuildPhase, Notification};
use registry_console_lib::services::build_watcher::BuildRef;
use registry_console_lib::services::resource_hooks::keys;
use registry_console_lib::services::{
    visibility_channel, BuildWatcher, NotificationPoller, PollState, PreferenceStore, QueryCache,
    ViewScope,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn preferences(dir: &tempfile::TempDir) -> PreferenceStore {
    let pool = db::initialize(&dir.path().join("console.db")).await.unwrap();
    PreferenceStore::new(pool)
}

async fn wait_for_marker(prefs: &PreferenceStore, expected: i64) {
    timeout(WAIT, async {
        while prefs.notifications_most_recent().await.unwrap() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn millis(date: &str) -> i64 {
    registry_console_lib::models::parse_api_date(date)
        .unwrap()
        .timestamp_millis()
}

#[tokio::test]
async fn test_notification_poller_reports_only_new_arrivals() {
    let registry = MockRegistry::start().await;
    registry
        .state
        .push_notification("n-1", "Tue, 14 May 2024 10:00:00 -0000");

    let dir = tempdir().unwrap();
    let prefs = preferences(&dir).await;
    let cache = QueryCache::new();
    let (_source, tracker) = visibility_channel();
    let scope = ViewScope::new("notifications");

    let (mut poller, mut new_notifications) = NotificationPoller::new(
        &scope,
        tracker,
        registry.client(),
        prefs.clone(),
        cache.clone(),
        Duration::from_millis(50),
    );
    poller.start();

    // First fetch only sets the marker
    wait_for_marker(&prefs, millis("Tue, 14 May 2024 10:00:00 -0000")).await;
    assert!(new_notifications.try_recv().is_err());

    registry
        .state
        .push_notification("n-2", "Tue, 14 May 2024 11:00:00 -0000");

    let batch = timeout(WAIT, new_notifications.recv())
        .await
        .unwrap()
        .unwrap();
    let ids: Vec<&str> = batch.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["n-2"]);
    wait_for_marker(&prefs, millis("Tue, 14 May 2024 11:00:00 -0000")).await;

    let cached = cache.snapshot::<Vec<Notification>>(&keys::notifications());
    assert_eq!(cached.data.map(|list| list.len()), Some(2));
    assert_eq!(poller.latest().borrow().len(), 2);
}

#[tokio::test]
async fn test_notification_poller_stops_on_authentication_failure() {
    let registry = MockRegistry::start().await;
    registry.state.unauthorized.store(true, Ordering::SeqCst);

    let dir = tempdir().unwrap();
    let (_source, tracker) = visibility_channel();
    let scope = ViewScope::new("notifications");
    let (mut poller, _new) = NotificationPoller::new(
        &scope,
        tracker,
        registry.client(),
        preferences(&dir).await,
        QueryCache::new(),
        Duration::from_millis(20),
    );

    poller.start();
    let mut states = poller.channel().watch_state();
    timeout(WAIT, states.wait_for(|s| *s == PollState::Idle))
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(registry.state.notification_requests.load(Ordering::SeqCst), 1);
    assert!(!poller.channel().is_polling());
}

#[tokio::test]
async fn test_hidden_page_defers_notification_fetch() {
    let registry = MockRegistry::start().await;
    let dir = tempdir().unwrap();
    let (source, tracker) = visibility_channel();
    let scope = ViewScope::new("notifications");
    let (mut poller, _new) = NotificationPoller::new(
        &scope,
        tracker,
        registry.client(),
        preferences(&dir).await,
        QueryCache::new(),
        Duration::from_secs(60),
    );
    let mut latest = poller.latest();

    source.set_hidden(true);
    poller.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.state.notification_requests.load(Ordering::SeqCst), 0);
    assert_eq!(poller.channel().state(), PollState::Skipping);

    // Far ahead of the next timer: only the visibility change can trigger this
    source.set_hidden(false);
    timeout(WAIT, latest.changed()).await.unwrap().unwrap();
    assert_eq!(registry.state.notification_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ending_scope_stops_notification_polling() {
    let registry = MockRegistry::start().await;
    let dir = tempdir().unwrap();
    let (source, tracker) = visibility_channel();
    let scope = ViewScope::new("notifications");
    let (mut poller, _new) = NotificationPoller::new(
        &scope,
        tracker,
        registry.client(),
        preferences(&dir).await,
        QueryCache::new(),
        Duration::from_millis(20),
    );
    let mut latest = poller.latest();

    poller.start();
    timeout(WAIT, latest.changed()).await.unwrap().unwrap();

    scope.end();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_end = registry.state.notification_requests.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        registry.state.notification_requests.load(Ordering::SeqCst),
        after_end
    );
    assert_eq!(source.subscriber_count(), 0);
}

#[tokio::test]
async fn test_build_watcher_stops_on_terminal_phase() {
    let registry = MockRegistry::start().await;
    registry.state.build_phases.lock().unwrap().extend(
        ["building", "pushing", "complete"]
            .iter()
            .map(|p| p.to_string()),
    );

    let (_source, tracker) = visibility_channel();
    let scope = ViewScope::new("build");
    let mut watcher = BuildWatcher::new(
        &scope,
        tracker,
        registry.client(),
        BuildRef::new("acme", "web", "b-1"),
        Duration::from_millis(20),
    );

    watcher.start();
    let mut states = watcher.channel().watch_state();
    timeout(WAIT, states.wait_for(|s| *s == PollState::Idle))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(watcher.phase(), Some(BuildPhase::Complete));
    assert_eq!(registry.state.build_requests.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.state.build_requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_build_watcher_stops_when_build_missing() {
    let registry = MockRegistry::start().await;
    let (_source, tracker) = visibility_channel();
    let scope = ViewScope::new("build");
    let mut watcher = BuildWatcher::new(
        &scope,
        tracker,
        registry.client(),
        BuildRef::new("acme", "web", "b-404"),
        Duration::from_millis(20),
    );

    watcher.start();
    let mut states = watcher.channel().watch_state();
    timeout(WAIT, states.wait_for(|s| *s == PollState::Idle))
        .await
        .unwrap()
        .unwrap();

    assert!(watcher.phase().is_none());
    assert_eq!(registry.state.build_requests.load(Ordering::SeqCst), 1);
}
