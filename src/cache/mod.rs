//! Client-side query cache
//!
//! Query results are cached per [`QueryKey`] and served until the key's scope
//! is invalidated or the entry expires. Entries are never patched in place:
//! a mutation invalidates, and the next read fetches again.

use dashmap::DashMap;
use moka::future::Cache;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_CAPACITY: u64 = 256;
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// The collection (or per-entity view) a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    Profiles,
    /// A single profile, keyed by user id
    Profile,
    Tasks,
    Projects,
    /// Notifications of one user, keyed by user id
    Notifications,
}

impl QueryScope {
    pub const ALL: [QueryScope; 5] = [
        QueryScope::Profiles,
        QueryScope::Profile,
        QueryScope::Tasks,
        QueryScope::Projects,
        QueryScope::Notifications,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: QueryScope,
    pub param: Option<String>,
}

impl QueryKey {
    pub fn all(scope: QueryScope) -> Self {
        Self { scope, param: None }
    }

    pub fn scoped(scope: QueryScope, param: impl ToString) -> Self {
        Self {
            scope,
            param: Some(param.to_string()),
        }
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Shared, concurrently readable query cache.
#[derive(Clone)]
pub struct QueryCache {
    entries: Cache<QueryKey, Entry>,
    /// Invalidation count per scope; also used as a generation so that a
    /// fetch started before an invalidation does not store its stale result
    generations: Arc<DashMap<QueryScope, u64>>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }
}

impl QueryCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            generations: Arc::new(DashMap::new()),
        }
    }

    fn generation(&self, scope: QueryScope) -> u64 {
        self.generations.get(&scope).map(|g| *g).unwrap_or(0)
    }

    /// Cached value for `key`, if present and of type `T`
    pub async fn get<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = self.entries.get(key).await?;
        entry.downcast_ref::<T>().cloned()
    }

    pub async fn insert<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.entries.insert(key, Arc::new(value)).await;
    }

    /// Serve `key` from the cache, or run `fetch` and cache its success.
    ///
    /// Errors are returned to the caller and never cached. A result whose
    /// scope was invalidated while it was being fetched is returned but not
    /// stored.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(&key).await {
            tracing::trace!(scope = ?key.scope, param = ?key.param, "Query cache hit");
            return Ok(hit);
        }
        let generation = self.generation(key.scope);
        let value = fetch().await?;
        if self.generation(key.scope) == generation {
            self.insert(key, value.clone()).await;
        }
        Ok(value)
    }

    /// Drop every entry of `scope`, whatever its parameter
    pub async fn invalidate_scope(&self, scope: QueryScope) {
        *self.generations.entry(scope).or_insert(0) += 1;
        let keys: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.scope == scope)
            .map(|(key, _)| (*key).clone())
            .collect();
        futures::future::join_all(keys.iter().map(|key| self.entries.invalidate(key))).await;
        tracing::debug!(scope = ?scope, entries = keys.len(), "Query scope invalidated");
    }

    /// Drop a single entry
    pub async fn invalidate(&self, key: &QueryKey) {
        *self.generations.entry(key.scope).or_insert(0) += 1;
        self.entries.invalidate(key).await;
    }

    /// Drop everything (used on sign-out)
    pub fn clear(&self) {
        for scope in QueryScope::ALL {
            *self.generations.entry(scope).or_insert(0) += 1;
        }
        self.entries.invalidate_all();
        tracing::debug!("Query cache cleared");
    }

    /// How many times `scope` has been invalidated
    pub fn invalidations(&self, scope: QueryScope) -> u64 {
        self.generation(scope)
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.entries.get(key).await.is_some()
    }
}
