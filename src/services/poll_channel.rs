//! Background poll channel.
//!
//! A [`PollChannel`] calls an async requester on a fixed interval for as
//! long as its view is mounted:
//! - at most one requester call is in flight per channel, even across
//!   stop/start cycles
//! - while the page is hidden, due calls are skipped; the call is retried
//!   as soon as the page becomes visible again
//! - the requester decides whether polling continues ([`PollOutcome`])
//! - `stop()` disarms the timer synchronously; an in-flight call is left to
//!   finish but its outcome is discarded
//!
//! There is no backoff, jitter or attempt limit: a requester that wants
//! those implements them itself.

use crate::services::view_scope::ViewScope;
use crate::services::visibility::VisibilityTracker;
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What the requester wants after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Arm the timer for the next call.
    Continue,

    /// Stop polling until the channel is started again.
    Stop,
}

/// Observable state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// No timer armed and no call in progress.
    Idle,

    /// Timer armed, waiting for the next call.
    Scheduled,

    /// Requester call in progress (or about to start).
    Working,

    /// A call came due while the page was hidden; timer re-armed.
    Skipping,
}

type Requester = Arc<dyn Fn() -> BoxFuture<'static, PollOutcome> + Send + Sync>;

/// State shared between a channel handle and its driver task.
struct Shared {
    label: String,
    requester: Requester,
    state: watch::Sender<PollState>,

    /// Held for the duration of every requester call.
    in_flight: Arc<tokio::sync::Mutex<()>>,

    /// Taken on teardown so the visibility subscription is released.
    visibility: Mutex<Option<VisibilityTracker>>,

    calls: AtomicU64,
}

impl Shared {
    /// Move to `next` unless `run` was cancelled in the meantime.
    ///
    /// The check happens under the state lock, so a concurrent `stop()`
    /// cannot be overwritten by a stale driver.
    fn transition(&self, run: &CancellationToken, next: PollState) -> bool {
        let applied = self.state.send_if_modified(|current| {
            if run.is_cancelled() || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if applied {
            log::debug!("[poll] {} -> {:?}", self.label, next);
        }
        applied
    }

    fn force_idle(&self) {
        if self.state.send_replace(PollState::Idle) != PollState::Idle {
            log::debug!("[poll] {} -> Idle (stopped)", self.label);
        }
    }

    fn visibility(&self) -> Option<VisibilityTracker> {
        self.visibility
            .lock()
            .map(|guard| (*guard).clone())
            .unwrap_or(None)
    }

    fn teardown(&self) {
        self.force_idle();
        if let Ok(mut guard) = self.visibility.lock() {
            if guard.take().is_some() {
                log::debug!("[poll] {} released visibility subscription", self.label);
            }
        }
    }
}

/// Interval poller bound to a view.
pub struct PollChannel {
    shared: Arc<Shared>,

    /// Cancelled when the view ends or the channel is dropped.
    life: CancellationToken,

    /// Token of the current driver run, if any.
    run: Option<CancellationToken>,

    sleep_time: Duration,
}

impl PollChannel {
    /// Create a stopped channel owned by `scope`.
    ///
    /// When created inside a tokio runtime, ending `scope` stops the
    /// channel and releases its visibility subscription even if the handle
    /// itself is still alive.
    pub fn new<F, Fut>(
        scope: &ViewScope,
        visibility: VisibilityTracker,
        sleep_time: Duration,
        requester: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PollOutcome> + Send + 'static,
    {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let label = format!("{}#{}", scope.name(), &id[..8]);
        let requester: Requester =
            Arc::new(move || -> BoxFuture<'static, PollOutcome> { Box::pin(requester()) });
        let (state, _) = watch::channel(PollState::Idle);

        let shared = Arc::new(Shared {
            label,
            requester,
            state,
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
            visibility: Mutex::new(Some(visibility)),
            calls: AtomicU64::new(0),
        });

        let life = scope.token().child_token();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = shared.clone();
            let life = life.clone();
            handle.spawn(async move {
                life.cancelled().await;
                shared.teardown();
            });
        }

        Self {
            shared,
            life,
            run: None,
            sleep_time,
        }
    }

    /// Start polling with an immediate first call.
    ///
    /// No-op while already polling or after the owning view has ended.
    pub fn start(&mut self) {
        self.start_inner(false);
    }

    /// Start polling with the first call one interval from now.
    pub fn start_after_delay(&mut self) {
        self.start_inner(true);
    }

    fn start_inner(&mut self, skip_first: bool) {
        if self.is_polling() {
            return;
        }

        if self.life.is_cancelled() {
            log::warn!("[poll] {} not started: view already ended", self.shared.label);
            return;
        }

        let Some(visibility) = self.shared.visibility() else {
            log::warn!("[poll] {} not started: torn down", self.shared.label);
            return;
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("[poll] {} not started: no tokio runtime", self.shared.label);
            return;
        };

        let run = self.life.child_token();
        self.run = Some(run.clone());

        let initial = if skip_first {
            PollState::Scheduled
        } else {
            PollState::Working
        };
        self.shared.state.send_replace(initial);

        log::debug!(
            "[poll] {} started (every {:?}, skip first: {})",
            self.shared.label,
            self.sleep_time,
            skip_first
        );

        handle.spawn(drive(
            self.shared.clone(),
            visibility,
            self.sleep_time,
            run,
            skip_first,
        ));
    }

    /// Disarm the timer and return to `Idle`. Idempotent.
    ///
    /// A requester call already in flight runs to completion; its outcome
    /// is ignored.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel();
        }
        self.shared.force_idle();
    }

    /// Change the interval and restart scheduling, with the first call one
    /// new interval from now. Stopped channels are started too; a channel
    /// whose view has ended stays stopped.
    pub fn set_sleep_time(&mut self, sleep_time: Duration) {
        self.sleep_time = sleep_time;
        self.stop();
        self.start_after_delay();
    }

    pub fn sleep_time(&self) -> Duration {
        self.sleep_time
    }

    pub fn state(&self) -> PollState {
        *self.shared.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<PollState> {
        self.shared.state.subscribe()
    }

    /// True between `start()` and `stop()`, unless the requester stopped.
    pub fn is_polling(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.is_cancelled())
            && self.state() != PollState::Idle
    }

    /// Requester invocations so far.
    pub fn call_count(&self) -> u64 {
        self.shared.calls.load(Ordering::SeqCst)
    }
}

impl Drop for PollChannel {
    fn drop(&mut self) {
        self.stop();
        self.life.cancel();
        self.shared.teardown();
    }
}

/// Sleep for `duration`; false if `run` was cancelled first.
async fn sleep_or_cancel(run: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = run.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Driver loop for one start/stop run.
async fn drive(
    shared: Arc<Shared>,
    mut visibility: VisibilityTracker,
    sleep_time: Duration,
    run: CancellationToken,
    skip_first: bool,
) {
    if skip_first && !sleep_or_cancel(&run, sleep_time).await {
        return;
    }

    loop {
        if visibility.is_hidden() {
            if !shared.transition(&run, PollState::Skipping) && run.is_cancelled() {
                return;
            }

            tokio::select! {
                _ = run.cancelled() => return,
                _ = tokio::time::sleep(sleep_time) => continue,
                _ = visibility.wait_visible() => {
                    log::debug!("[poll] {} page visible again, calling now", shared.label);
                    continue;
                }
            }
        }

        shared.transition(&run, PollState::Working);

        let permit = tokio::select! {
            _ = run.cancelled() => return,
            permit = shared.in_flight.clone().lock_owned() => permit,
        };

        if run.is_cancelled() {
            return;
        }

        shared.calls.fetch_add(1, Ordering::SeqCst);

        // The call runs in its own task holding the permit, so a stopped
        // driver returns at once and drops its visibility tracker while the
        // call finishes in the background.
        let requester = shared.requester.clone();
        let call = tokio::spawn(async move {
            let outcome = requester().await;
            drop(permit);
            outcome
        });

        let outcome = tokio::select! {
            _ = run.cancelled() => {
                log::debug!("[poll] {} stopped during call; outcome will be discarded", shared.label);
                return;
            }
            joined = call => match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("[poll] {} requester failed: {}", shared.label, err);
                    shared.transition(&run, PollState::Idle);
                    return;
                }
            },
        };

        match outcome {
            PollOutcome::Stop => {
                shared.transition(&run, PollState::Idle);
                log::debug!("[poll] {} stopped by requester", shared.label);
                return;
            }
            PollOutcome::Continue => {
                shared.transition(&run, PollState::Scheduled);
                if !sleep_or_cancel(&run, sleep_time).await {
                    return;
                }
            }
        }
    }
}
