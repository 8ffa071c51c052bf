//! Paginated, searchable resource views.
//!
//! Each hook loads a whole collection through the [`QueryCache`] and then
//! filters, sorts and pages it in memory with the caller's
//! [`TableState`]. Search never goes to the server.

use crate::error::AppError;
use crate::models::{Build, Notification, Repository, Robot, Tag};
use crate::services::query_cache::{QueryCache, QueryKey, QuerySnapshot};
use crate::services::registry_client::RegistryClient;
use crate::services::table::{TableRow, TableState};
use serde::Serialize;
use std::future::Future;

/// What a list view renders.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceView<T> {
    /// At most `per_page` rows of the current page.
    pub visible_items: Vec<T>,

    /// Rows matching the search across all pages.
    pub total_count: usize,

    pub page_count: usize,

    /// Initial fetch in flight, or previous data shown while revalidating.
    pub loading: bool,

    pub error: Option<AppError>,
}

/// Project a cache snapshot through a table's search, sort and page.
pub fn build_view<T: TableRow + Clone>(
    snapshot: &QuerySnapshot<Vec<T>>,
    table: &TableState<T>,
) -> ResourceView<T> {
    let rows: &[T] = snapshot.data.as_deref().map(Vec::as_slice).unwrap_or(&[]);
    let slice = table.apply(rows);

    ResourceView {
        visible_items: slice.visible.into_iter().cloned().collect(),
        total_count: slice.total_count,
        page_count: slice.page_count,
        loading: snapshot.is_loading(),
        error: snapshot.error.clone(),
    }
}

/// Cache keys, shared with mutations that invalidate them.
pub mod keys {
    use super::QueryKey;

    pub fn repositories(namespace: &str) -> QueryKey {
        QueryKey::namespace(namespace, "repositories")
    }

    pub fn robots(namespace: &str) -> QueryKey {
        QueryKey::namespace(namespace, "robots")
    }

    pub fn tags(namespace: &str, repo: &str) -> QueryKey {
        QueryKey::repository(namespace, repo, "tags")
    }

    pub fn builds(namespace: &str, repo: &str) -> QueryKey {
        QueryKey::repository(namespace, repo, "builds")
    }

    /// Everything cached for one repository.
    pub fn repository(namespace: &str, repo: &str) -> QueryKey {
        QueryKey::new(["Repository", namespace, repo])
    }

    pub fn notifications() -> QueryKey {
        QueryKey::new(["User", "notifications"])
    }
}

/// Data hooks for list views.
#[derive(Debug, Clone)]
pub struct ResourceHooks {
    client: RegistryClient,
    cache: QueryCache,
}

impl ResourceHooks {
    pub fn new(client: RegistryClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Fetch when stale, then render. Errors land in the view.
    async fn load<T, F, Fut>(
        &self,
        key: QueryKey,
        table: &TableState<T>,
        fetcher: F,
    ) -> ResourceView<T>
    where
        T: TableRow + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, AppError>>,
    {
        // Failures are recorded on the cache entry and surface via the snapshot
        let _ = self.cache.fetch(&key, fetcher).await;
        build_view(&self.cache.snapshot(&key), table)
    }

    /// Render whatever is cached for `key` without fetching.
    pub fn peek<T>(&self, key: &QueryKey, table: &TableState<T>) -> ResourceView<T>
    where
        T: TableRow + Clone + Send + Sync + 'static,
    {
        build_view(&self.cache.snapshot(key), table)
    }

    pub async fn repositories(
        &self,
        namespace: &str,
        table: &TableState<Repository>,
    ) -> ResourceView<Repository> {
        let client = self.client.clone();
        let namespace = namespace.to_string();
        self.load(keys::repositories(&namespace), table, || async move {
            client.list_repositories(&namespace).await
        })
        .await
    }

    /// Active tags of a repository, all pages.
    pub async fn tags(&self, namespace: &str, repo: &str, table: &TableState<Tag>) -> ResourceView<Tag> {
        let client = self.client.clone();
        let (namespace, repo) = (namespace.to_string(), repo.to_string());
        self.load(keys::tags(&namespace, &repo), table, || async move {
            client.list_all_tags(&namespace, &repo).await
        })
        .await
    }

    pub async fn robots(
        &self,
        namespace: &str,
        is_user: bool,
        table: &TableState<Robot>,
    ) -> ResourceView<Robot> {
        let client = self.client.clone();
        let namespace = namespace.to_string();
        self.load(keys::robots(&namespace), table, || async move {
            client.list_robots(&namespace, is_user).await
        })
        .await
    }

    pub async fn notifications(&self, table: &TableState<Notification>) -> ResourceView<Notification> {
        let client = self.client.clone();
        self.load(keys::notifications(), table, || async move {
            Ok(client.list_notifications().await?.notifications)
        })
        .await
    }

    pub async fn builds(
        &self,
        namespace: &str,
        repo: &str,
        limit: u32,
        table: &TableState<Build>,
    ) -> ResourceView<Build> {
        let client = self.client.clone();
        let (namespace, repo) = (namespace.to_string(), repo.to_string());
        self.load(keys::builds(&namespace, &repo), table, || async move {
            client.list_builds(&namespace, &repo, limit).await
        })
        .await
    }

    // Mutations

    pub async fn delete_tag(&self, namespace: &str, repo: &str, tag: &str) -> Result<(), AppError> {
        self.client.delete_tag(namespace, repo, tag).await?;
        self.cache.invalidate(&keys::tags(namespace, repo));
        Ok(())
    }

    pub async fn delete_robot(
        &self,
        namespace: &str,
        robot: &str,
        is_user: bool,
        confirmation: &str,
    ) -> Result<(), AppError> {
        self.client
            .delete_robot(namespace, robot, is_user, confirmation)
            .await?;
        self.cache.invalidate(&keys::robots(namespace));
        Ok(())
    }

    /// Dismiss a notification and refetch the list on next read.
    ///
    /// Kinds that cannot be dismissed are rejected without a request.
    pub async fn dismiss_notification(&self, notification: &Notification) -> Result<(), AppError> {
        if !notification.can_dismiss() {
            return Err(AppError::invalid_input_field(
                format!("Notifications of kind '{}' cannot be dismissed", notification.kind),
                "kind",
            ));
        }

        self.client.dismiss_notification(&notification.id).await?;
        self.cache.invalidate(&keys::notifications());
        Ok(())
    }

    pub async fn delete_repository(
        &self,
        namespace: &str,
        repo: &str,
        confirmation: &str,
    ) -> Result<(), AppError> {
        self.client
            .delete_repository(namespace, repo, confirmation)
            .await?;
        self.cache.invalidate(&keys::repositories(namespace));
        self.cache.invalidate_prefix(&keys::repository(namespace, repo));
        Ok(())
    }
}
