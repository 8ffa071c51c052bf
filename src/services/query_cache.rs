//! Keyed cache for server data.
//!
//! Entries are addressed by a composite [`QueryKey`] such as
//! `["Namespace", "acme", "robots"]`. A cached value stays in place while it
//! is revalidated so views can keep showing it as a placeholder; mutations
//! invalidate by key or key prefix and the next read refetches.
//!
//! Concurrent fetches of one key are coalesced: the second caller waits for
//! the first and reads its result.

use crate::error::AppError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// `["Namespace", namespace, kind]`
    pub fn namespace(namespace: &str, kind: &str) -> Self {
        Self::new(["Namespace", namespace, kind])
    }

    /// `["Repository", namespace, repo, kind]`
    pub fn repository(namespace: &str, repo: &str, kind: &str) -> Self {
        Self::new(["Repository", namespace, repo, kind])
    }

    /// Append one more part.
    pub fn with(mut self, part: impl Into<String>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Point-in-time view of one cache entry.
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    /// Last successfully fetched value; kept while revalidating or after a
    /// failed refetch.
    pub data: Option<Arc<T>>,

    pub is_fetching: bool,

    /// Invalidated or older than the stale time.
    pub is_stale: bool,

    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<AppError>,
}

impl<T> QuerySnapshot<T> {
    /// True while a fetch is running, or before the first fetch has
    /// produced either data or an error.
    pub fn is_loading(&self) -> bool {
        self.is_fetching || (self.data.is_none() && self.error.is_none())
    }
}

type CachedValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug)]
struct Entry {
    data: Option<CachedValue>,
    updated_at: Option<Instant>,
    stale: bool,
    error: Option<AppError>,
    fetching: bool,

    /// Bumped by every invalidation; a fetch that started under an older
    /// generation stores its data as already stale.
    generation: u64,

    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            data: None,
            updated_at: None,
            stale: true,
            error: None,
            fetching: false,
            generation: 0,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn is_stale(&self, stale_time: Option<Duration>) -> bool {
        if self.stale || self.data.is_none() {
            return true;
        }
        match (stale_time, self.updated_at) {
            (Some(limit), Some(at)) => at.elapsed() >= limit,
            _ => false,
        }
    }
}

/// Shared query cache. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<QueryKey, Entry>>>,

    /// Age after which data is refetched even without an invalidation.
    stale_time: Option<Duration>,
}

impl QueryCache {
    /// Data stays fresh until invalidated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data also goes stale `stale_time` after it was fetched.
    pub fn with_stale_time(stale_time: Duration) -> Self {
        Self {
            entries: Arc::default(),
            stale_time: Some(stale_time),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached value when present and fresh.
    fn fresh<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.read();
        let entry = entries.get(key)?;
        if entry.is_stale(self.stale_time) {
            return None;
        }
        downcast(key, entry.data.as_ref()?)
    }

    /// Return fresh cached data, or run `fetcher` and cache its result.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, AppError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(data) = self.fresh::<T>(key) {
            return Ok(data);
        }

        let gate = self.gate(key);
        let _guard = gate.lock().await;

        // Another caller may have fetched while we waited
        if let Some(data) = self.fresh::<T>(key) {
            return Ok(data);
        }

        self.run_fetch(key, fetcher).await
    }

    /// Fetch unconditionally, keeping the old value visible meanwhile.
    pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, AppError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let gate = self.gate(key);
        let _guard = gate.lock().await;
        self.run_fetch(key, fetcher).await
    }

    async fn run_fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, AppError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let generation = {
            let mut entries = self.write();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetching = true;
            entry.generation
        };

        let in_progress = FetchInProgress { cache: self, key };

        log::debug!("[cache] Fetching {}", key);
        let result = fetcher().await;
        drop(in_progress);

        let mut entries = self.write();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);

        match result {
            Ok(value) => {
                let value = Arc::new(value);
                entry.data = Some(value.clone() as CachedValue);
                entry.updated_at = Some(Instant::now());
                entry.error = None;
                entry.stale = entry.generation != generation;
                Ok(value)
            }
            Err(err) => {
                log::warn!("[cache] Fetch of {} failed: {}", key, err);
                entry.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn gate(&self, key: &QueryKey) -> Arc<tokio::sync::Mutex<()>> {
        self.write()
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .gate
            .clone()
    }

    /// Current state of `key` without fetching.
    pub fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QuerySnapshot<T> {
        let entries = self.read();
        match entries.get(key) {
            Some(entry) => QuerySnapshot {
                data: entry.data.as_ref().and_then(|d| downcast(key, d)),
                is_fetching: entry.fetching,
                is_stale: entry.is_stale(self.stale_time),
                error: entry.error.clone(),
            },
            None => QuerySnapshot {
                data: None,
                is_fetching: false,
                is_stale: true,
                error: None,
            },
        }
    }

    /// Replace the cached value, e.g. after a mutation returned it.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let mut entries = self.write();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.data = Some(Arc::new(value) as CachedValue);
        entry.updated_at = Some(Instant::now());
        entry.stale = false;
        entry.error = None;
    }

    /// Mark one entry stale. Returns false if it was never cached.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.write();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                entry.generation += 1;
                log::debug!("[cache] Invalidated {}", key);
                true
            }
            None => false,
        }
    }

    /// Mark every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.write();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                entry.generation += 1;
                count += 1;
            }
        }
        log::debug!("[cache] Invalidated {} entries under {}", count, prefix);
        count
    }

    /// Forget an entry entirely.
    pub fn remove(&self, key: &QueryKey) {
        self.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Clears the fetching flag when a fetch ends, including when the caller's
/// future is dropped mid-fetch.
struct FetchInProgress<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
}

impl Drop for FetchInProgress<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.cache.write().get_mut(self.key) {
            entry.fetching = false;
        }
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: &CachedValue) -> Option<Arc<T>> {
    match value.clone().downcast::<T>() {
        Ok(typed) => Some(typed),
        Err(_) => {
            log::warn!("[cache] {} holds a different type than requested", key);
            None
        }
    }
}
