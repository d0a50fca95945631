//! In-memory backend.
//!
//! Implements both [`DataStore`] and [`AuthBackend`] over
//! `tokio::sync::RwLock<HashMap<..>>` tables. Used by the CLI's `--offline`
//! mode and by tests, which can inject failures, override responses and add
//! latency per collection.

use super::traits::{AuthBackend, DataStore, RemoteResult};
use super::types::*;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

const AUTH_EVENT_CAPACITY: usize = 64;

/// A data operation, used to target failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    SelectSingle,
    Insert,
    Update,
    Delete,
}

/// An auth operation, used to target failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOperation {
    SignIn,
    SignUp,
    SignOut,
    GetSession,
}

struct Account {
    password: String,
    user: AuthUser,
}

/// In-memory implementation of the backend traits.
pub struct MemoryBackend {
    tables: RwLock<HashMap<Collection, Vec<Value>>>,
    failures: RwLock<HashMap<(Collection, Operation), RemoteError>>,
    overrides: RwLock<HashMap<(Collection, Operation), Value>>,
    latency: RwLock<HashMap<Collection, Duration>>,
    calls: DashMap<(Collection, Operation), usize>,

    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<Session>>,
    auth_failures: RwLock<HashMap<AuthOperation, RemoteError>>,
    require_confirmation: bool,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Total order over JSON scalars used for `order by`: nulls first, then
/// booleans, numbers, strings.
fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            tables: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            overrides: RwLock::new(HashMap::new()),
            latency: RwLock::new(HashMap::new()),
            calls: DashMap::new(),
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            auth_failures: RwLock::new(HashMap::new()),
            require_confirmation: false,
            auth_events,
        }
    }

    /// Sign-ups return no session until the address is confirmed
    pub fn with_email_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    // ========================================================================
    // Test controls
    // ========================================================================

    /// Make every `op` on `collection` fail with `error` until cleared
    pub async fn fail_on(&self, collection: Collection, op: Operation, error: RemoteError) {
        self.failures.write().await.insert((collection, op), error);
    }

    pub async fn fail_auth(&self, op: AuthOperation, error: RemoteError) {
        self.auth_failures.write().await.insert(op, error);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
        self.auth_failures.write().await.clear();
    }

    /// Return `response` from `op` on `collection` instead of the stored row.
    /// The write itself still happens.
    pub async fn override_response(&self, collection: Collection, op: Operation, response: Value) {
        self.overrides.write().await.insert((collection, op), response);
    }

    pub async fn set_latency(&self, collection: Collection, latency: Duration) {
        self.latency.write().await.insert(collection, latency);
    }

    /// Number of calls made for `op` on `collection`, failed ones included
    pub fn calls(&self, collection: Collection, op: Operation) -> usize {
        self.calls.get(&(collection, op)).map(|c| *c).unwrap_or(0)
    }

    /// Insert a row directly, bypassing failure injection and latency
    pub async fn seed(&self, collection: Collection, row: Value) -> Value {
        let row = Self::with_defaults(row);
        self.tables
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(row.clone());
        row
    }

    /// Snapshot of a table in insertion order
    pub async fn rows(&self, collection: Collection) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Register an account without going through sign-up
    pub async fn add_account(&self, email: &str, password: &str, metadata: Value) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        self.accounts.write().await.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Push an auth event to subscribers, replacing the held session
    pub async fn emit(&self, event: AuthEvent) {
        *self.session.write().await = event.session.clone();
        // No subscribers is fine
        let _ = self.auth_events.send(event);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn with_defaults(row: Value) -> Value {
        let mut map = match row {
            Value::Object(map) => map,
            other => return other,
        };
        let now = now_timestamp();
        map.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        map.entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        map.entry("updated_at").or_insert_with(|| Value::String(now));
        Value::Object(map)
    }

    async fn enter(&self, collection: Collection, op: Operation) -> RemoteResult<()> {
        *self.calls.entry((collection, op)).or_insert(0) += 1;
        let latency = self.latency.read().await.get(&collection).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.read().await.get(&(collection, op)) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn enter_auth(&self, op: AuthOperation) -> RemoteResult<()> {
        match self.auth_failures.read().await.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn respond(&self, collection: Collection, op: Operation, stored: Value) -> Value {
        self.overrides
            .read()
            .await
            .get(&(collection, op))
            .cloned()
            .unwrap_or(stored)
    }

    fn new_session(user: AuthUser) -> Session {
        Session {
            access_token: format!("mem-{}", Uuid::new_v4().simple()),
            refresh_token: Some(Uuid::new_v4().simple().to_string()),
            expires_at: Some(Utc::now().timestamp() + 3600),
            user,
        }
    }

    /// Mirror the backend's sign-up trigger: every identity gets a profile row
    async fn create_profile_for(&self, user: &AuthUser) {
        let meta = |key: &str| user.user_metadata.get(key).cloned().unwrap_or(Value::Null);
        let role = match meta("role") {
            Value::String(role) => role,
            _ => "viewer".to_string(),
        };
        self.seed(
            Collection::Profiles,
            json!({
                "id": user.id.to_string(),
                "first_name": meta("first_name"),
                "last_name": meta("last_name"),
                "avatar_url": null,
                "role": role,
                "updated_at": null,
            }),
        )
        .await;
    }
}

#[async_trait]
impl DataStore for MemoryBackend {
    async fn select(&self, collection: Collection, query: &SelectQuery) -> RemoteResult<Vec<Value>> {
        self.enter(collection, Operation::Select).await?;
        let tables = self.tables.read().await;
        let rows = tables.get(&collection).map(Vec::as_slice).unwrap_or_default();

        let mut hits: Vec<(usize, &Value)> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                query
                    .filters
                    .iter()
                    .all(|(column, value)| row.get(column) == Some(value))
            })
            .collect();

        if let Some(order) = &query.order {
            hits.sort_by(|(ia, a), (ib, b)| {
                compare_json(a.get(&order.column), b.get(&order.column)).then(ia.cmp(ib))
            });
            // Descending also puts later inserts first among equal keys
            if !order.ascending {
                hits.reverse();
            }
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(hits.into_iter().take(limit).map(|(_, row)| row.clone()).collect())
    }

    async fn select_single(&self, collection: Collection, id: Uuid) -> RemoteResult<Value> {
        self.enter(collection, Operation::SelectSingle).await?;
        let id = id.to_string();
        let found = self
            .tables
            .read()
            .await
            .get(&collection)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id.as_str())).cloned());
        match found {
            Some(row) => Ok(self.respond(collection, Operation::SelectSingle, row).await),
            None => Err(RemoteError::not_found()),
        }
    }

    async fn insert(&self, collection: Collection, row: Value) -> RemoteResult<Value> {
        self.enter(collection, Operation::Insert).await?;
        if !row.is_object() {
            return Err(RemoteError::new("Row must be a JSON object")
                .with_code("PGRST102")
                .with_status(400));
        }
        let row = Self::with_defaults(row);
        {
            let mut tables = self.tables.write().await;
            let table = tables.entry(collection).or_default();
            if let Some(id) = row_id(&row) {
                if table.iter().any(|r| row_id(r) == Some(id)) {
                    return Err(RemoteError::new(format!(
                        "duplicate key value violates unique constraint \"{}_pkey\"",
                        collection.table()
                    ))
                    .with_code("23505")
                    .with_status(409));
                }
            }
            table.push(row.clone());
        }
        Ok(self.respond(collection, Operation::Insert, row).await)
    }

    async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> RemoteResult<Value> {
        self.enter(collection, Operation::Update).await?;
        let Value::Object(patch) = patch else {
            return Err(RemoteError::new("Patch must be a JSON object")
                .with_code("PGRST102")
                .with_status(400));
        };
        let id = id.to_string();
        let updated = {
            let mut tables = self.tables.write().await;
            let row = tables
                .get_mut(&collection)
                .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id.as_str())));
            match row {
                Some(Value::Object(map)) => {
                    map.extend(patch);
                    map.insert("updated_at".into(), Value::String(now_timestamp()));
                    Value::Object(map.clone())
                }
                _ => return Err(RemoteError::not_found()),
            }
        };
        Ok(self.respond(collection, Operation::Update, updated).await)
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> RemoteResult<()> {
        self.enter(collection, Operation::Delete).await?;
        let id = id.to_string();
        if let Some(rows) = self.tables.write().await.get_mut(&collection) {
            rows.retain(|row| row_id(row) != Some(id.as_str()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session> {
        self.enter_auth(AuthOperation::SignIn).await?;
        let user = {
            let accounts = self.accounts.read().await;
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    return Err(RemoteError::new("Invalid login credentials")
                        .with_code("invalid_credentials")
                        .with_status(400))
                }
            }
        };
        let session = Self::new_session(user);
        self.emit(AuthEvent::signed_in(session.clone())).await;
        Ok(session)
    }

    async fn sign_up(&self, request: SignUpRequest) -> RemoteResult<SignUpOutcome> {
        self.enter_auth(AuthOperation::SignUp).await?;
        let key = request.email.to_lowercase();
        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(RemoteError::new("User already registered")
                    .with_code("user_already_exists")
                    .with_status(422));
            }
            let metadata = match request.data {
                Value::Null => Value::Object(Map::new()),
                other => other,
            };
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: Some(request.email.clone()),
                user_metadata: metadata,
            };
            accounts.insert(
                key,
                Account {
                    password: request.password,
                    user: user.clone(),
                },
            );
            user
        };
        self.create_profile_for(&user).await;

        if self.require_confirmation {
            return Ok(SignUpOutcome {
                user,
                session: None,
            });
        }
        let session = Self::new_session(user.clone());
        self.emit(AuthEvent::signed_in(session.clone())).await;
        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        self.enter_auth(AuthOperation::SignOut).await?;
        let had_session = self.session.read().await.is_some();
        // The local session is dropped even when the server no longer knows it
        self.emit(AuthEvent::signed_out()).await;
        if had_session {
            Ok(())
        } else {
            Err(RemoteError::new(SESSION_NOT_FOUND).with_status(403))
        }
    }

    async fn get_session(&self) -> RemoteResult<Option<Session>> {
        self.enter_auth(AuthOperation::GetSession).await?;
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}
