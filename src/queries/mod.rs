//! Query and mutation hooks
//!
//! Each hook validates its input, talks to the [`DataStore`] or
//! [`AuthBackend`], re-validates what comes back, and then settles:
//!
//! - success: invalidate the affected cache scopes, show the success toast,
//!   emit a [`CrudEvent`] for subscribed views
//! - failure: log the error, show the destructive toast, leave the cache alone
//!
//! Lists are served from the [`QueryCache`] until invalidated.

mod auth;
mod error;
mod notifications;
mod profiles;
mod projects;
mod tasks;

pub use error::{QueryError, QueryResult};
pub use projects::ProjectStats;
pub use tasks::TaskStats;

use crate::cache::{QueryCache, QueryKey, QueryScope};
use crate::events::{CrudAction, CrudEvent, EntityType, EventEmitter};
use crate::remote::{AuthBackend, Collection, DataStore, SelectQuery};
use crate::schema::{revalidate, validate_array, Schema};
use crate::toast::{Notifier, Toast};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// How a mutation settles: which scopes it invalidates and what it tells the user.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Outcome {
    /// Used in log lines
    pub action: &'static str,
    pub invalidates: &'static [QueryScope],
    /// (title, description) of the success toast
    pub success: Option<(&'static str, &'static str)>,
    /// (title, description) of the destructive toast
    pub failure: Option<(&'static str, &'static str)>,
}

/// Entry point for every hook.
///
/// Cheap to clone; clones share the backend, cache and channels.
#[derive(Clone)]
pub struct QueryClient {
    store: Arc<dyn DataStore>,
    auth: Arc<dyn AuthBackend>,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
}

impl QueryClient {
    pub fn new(
        store: Arc<dyn DataStore>,
        auth: Arc<dyn AuthBackend>,
        cache: QueryCache,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            auth,
            cache,
            notifier,
            event_emitter: None,
        }
    }

    /// Emit a [`CrudEvent`] after every successful mutation (builder pattern)
    pub fn with_event_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.event_emitter = Some(emitter);
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn auth(&self) -> &Arc<dyn AuthBackend> {
        &self.auth
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    /// Apply the success or failure side effects of a mutation
    pub(crate) async fn settle<T>(&self, outcome: &Outcome, result: QueryResult<T>) -> QueryResult<T> {
        match &result {
            Ok(_) => {
                for scope in outcome.invalidates {
                    self.cache.invalidate_scope(*scope).await;
                }
                if let Some((title, description)) = outcome.success {
                    self.notifier.notify(Toast::success(title, description));
                }
            }
            Err(err) => {
                tracing::error!(
                    action = outcome.action,
                    kind = err.kind(),
                    error = %err,
                    "Mutation failed"
                );
                if let Some((title, description)) = outcome.failure {
                    self.notifier.notify(Toast::error(title, description));
                }
            }
        }
        result
    }

    /// Emit a CRUD event (no-op if event_emitter is None)
    fn emit(&self, event: CrudEvent) {
        if let Some(emitter) = &self.event_emitter {
            emitter.emit(event);
        }
    }

    pub(crate) fn publish<T: Serialize>(
        &self,
        entity_type: EntityType,
        action: CrudAction,
        entity_id: Uuid,
        record: Option<&T>,
        actor: Option<Uuid>,
    ) {
        if self.event_emitter.is_none() {
            return;
        }
        let mut event = CrudEvent::new(entity_type, action, entity_id.to_string());
        if let Some(record) = record {
            match serde_json::to_value(record) {
                Ok(payload) => event = event.with_payload(payload),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize event payload"),
            }
        }
        if let Some(actor) = actor {
            event = event.with_actor(actor.to_string());
        }
        self.emit(event);
    }

    /// Fetch a list through the cache.
    ///
    /// `prepare` runs on every raw row before validation (client-side fields).
    pub(crate) async fn fetch_list<T>(
        &self,
        key: QueryKey,
        collection: Collection,
        query: SelectQuery,
        prepare: fn(&mut Value),
    ) -> QueryResult<Vec<T>>
    where
        T: Schema + Clone + Send + Sync + 'static,
    {
        let result = self
            .cache
            .get_or_fetch(key, || async {
                let mut rows = self.store.select(collection, &query).await?;
                rows.iter_mut().for_each(prepare);
                validate_array::<T>(&Value::Array(rows)).map_err(QueryError::ResponseShape)
            })
            .await;
        if let Err(err) = &result {
            tracing::error!(
                collection = %collection,
                kind = err.kind(),
                error = %err,
                "Query failed"
            );
        }
        result
    }
}

/// Run an input through its form schema before anything is sent
pub(crate) fn check_input<T: Schema + Serialize>(input: &T) -> QueryResult<T> {
    revalidate(input).map_err(QueryError::Validation)
}

/// Validate a backend response against the canonical record schema
pub(crate) fn parse_row<T: Schema>(row: &Value) -> QueryResult<T> {
    T::validate(row).map_err(QueryError::ResponseShape)
}

fn keep_row(_: &mut Value) {}
