//! Page visibility tracking.
//!
//! The host (a browser shell, a desktop window, a terminal UI) reports
//! visibility changes through a single [`VisibilitySource`]. Every poller
//! observes them through a read-only [`VisibilityTracker`]; one source is
//! multiplexed to all subscribers.

use serde::Serialize;
use tokio::sync::watch;

/// Visibility of the hosting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Write side, owned by the host.
#[derive(Debug)]
pub struct VisibilitySource {
    tx: watch::Sender<Visibility>,
}

/// Read side, cloned freely into pollers.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    rx: watch::Receiver<Visibility>,
}

/// Create a linked source/tracker pair, initially visible.
pub fn visibility_channel() -> (VisibilitySource, VisibilityTracker) {
    let (tx, rx) = watch::channel(Visibility::Visible);
    (VisibilitySource { tx }, VisibilityTracker { rx })
}

impl VisibilitySource {
    /// Report a visibility change from the host.
    ///
    /// Subscribers are woken only when the value actually changes.
    pub fn set_hidden(&self, hidden: bool) {
        let next = if hidden {
            Visibility::Hidden
        } else {
            Visibility::Visible
        };

        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            log::debug!("[visibility] Page is now {:?}", next);
        }
    }

    pub fn tracker(&self) -> VisibilityTracker {
        VisibilityTracker {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live trackers; pollers release theirs on teardown.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl VisibilityTracker {
    pub fn current(&self) -> Visibility {
        *self.rx.borrow()
    }

    pub fn is_hidden(&self) -> bool {
        self.current() == Visibility::Hidden
    }

    /// Wait until the page is visible.
    ///
    /// Returns immediately when already visible. If the source is gone the
    /// last known value is final; a hidden page then never becomes visible
    /// and this future stays pending.
    pub async fn wait_visible(&mut self) {
        if self.rx.wait_for(|v| *v == Visibility::Visible).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Wait for the next change and return the new value.
    ///
    /// Returns `None` once the source has been dropped.
    pub async fn changed(&mut self) -> Option<Visibility> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
