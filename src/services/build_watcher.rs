//! Polls one build until it finishes.

use crate::error::AppError;
use crate::models::{Build, BuildPhase};
use crate::services::poll_channel::{PollChannel, PollOutcome};
use crate::services::registry_client::RegistryClient;
use crate::services::view_scope::ViewScope;
use crate::services::visibility::VisibilityTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Identifies the watched build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRef {
    pub namespace: String,
    pub repo: String,
    pub build_id: String,
}

impl BuildRef {
    pub fn new(namespace: impl Into<String>, repo: impl Into<String>, build_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            repo: repo.into(),
            build_id: build_id.into(),
        }
    }
}

/// Decide whether to keep polling after a status fetch.
pub fn next_step(result: &Result<Build, AppError>) -> PollOutcome {
    match result {
        Ok(build) if build.phase.is_terminal() => PollOutcome::Stop,
        Ok(_) => PollOutcome::Continue,
        Err(err) if err.is_permanent() => PollOutcome::Stop,
        Err(_) => PollOutcome::Continue,
    }
}

async fn check_build(
    client: RegistryClient,
    build: Arc<BuildRef>,
    latest: Arc<watch::Sender<Option<Build>>>,
) -> PollOutcome {
    let result = client
        .get_build(&build.namespace, &build.repo, &build.build_id)
        .await;

    match &result {
        Ok(current) => {
            let previous = latest.borrow().as_ref().map(|b| b.phase);
            if previous != Some(current.phase) {
                log::info!("[builds] Build {} is {}", build.build_id, current.phase);
            }
            latest.send_replace(Some(current.clone()));
        }
        Err(err) => log::warn!("[builds] Status of {} unavailable: {}", build.build_id, err),
    }

    let outcome = next_step(&result);
    if outcome == PollOutcome::Stop {
        log::debug!("[builds] Stopped watching {}", build.build_id);
    }
    outcome
}

/// Build status poller bound to a view.
pub struct BuildWatcher {
    channel: PollChannel,
    latest: watch::Receiver<Option<Build>>,
}

impl BuildWatcher {
    pub fn new(
        scope: &ViewScope,
        visibility: VisibilityTracker,
        client: RegistryClient,
        build: BuildRef,
        interval: Duration,
    ) -> Self {
        let (latest_tx, latest) = watch::channel(None);
        let latest_tx = Arc::new(latest_tx);
        let build = Arc::new(build);

        let channel = PollChannel::new(scope, visibility, interval, move || {
            check_build(client.clone(), build.clone(), latest_tx.clone())
        });

        Self { channel, latest }
    }

    pub fn start(&mut self) {
        self.channel.start();
    }

    pub fn stop(&mut self) {
        self.channel.stop();
    }

    /// Last fetched build status.
    pub fn latest(&self) -> watch::Receiver<Option<Build>> {
        self.latest.clone()
    }

    pub fn phase(&self) -> Option<BuildPhase> {
        self.latest.borrow().as_ref().map(|b| b.phase)
    }

    pub fn channel(&self) -> &PollChannel {
        &self.channel
    }
}
