//! Business logic services.
//!
//! Everything here is independent of any particular view layer: views
//! drive these services and render what they return.

pub mod build_watcher;
pub mod confirmation;
pub mod notification_poller;
pub mod poll_channel;
pub mod preferences;
pub mod query_cache;
pub mod registry_client;
pub mod resource_hooks;
pub mod table;
pub mod view_scope;
pub mod visibility;

pub use build_watcher::{BuildRef, BuildWatcher};
pub use confirmation::confirm_destructive;
pub use notification_poller::NotificationPoller;
pub use poll_channel::{PollChannel, PollOutcome, PollState};
pub use preferences::PreferenceStore;
pub use query_cache::{QueryCache, QueryKey};
pub use registry_client::RegistryClient;
pub use resource_hooks::{ResourceHooks, ResourceView};
pub use table::TableState;
pub use view_scope::ViewScope;
pub use visibility::{visibility_channel, VisibilitySource, VisibilityTracker};
