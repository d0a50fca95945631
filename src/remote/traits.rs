//! Backend trait definitions
//!
//! Abstract interface over the hosted relational store and its auth service.
//! Both the HTTP client and the in-memory backend implement these, so hooks
//! and the session controller never depend on a concrete transport.

use super::types::*;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Row-level access to the backend tables.
///
/// Rows travel as raw JSON: the caller validates them against the canonical
/// schema, the store never does.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Select rows matching every equality filter, ordered and limited
    async fn select(&self, collection: Collection, query: &SelectQuery) -> RemoteResult<Vec<Value>>;

    /// Select exactly one row by id. Zero rows is a `PGRST116` error.
    async fn select_single(&self, collection: Collection, id: Uuid) -> RemoteResult<Value>;

    /// Insert a row and return its stored representation
    async fn insert(&self, collection: Collection, row: Value) -> RemoteResult<Value>;

    /// Update the supplied fields of one row and return its stored representation
    async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> RemoteResult<Value>;

    /// Delete one row by id
    async fn delete(&self, collection: Collection, id: Uuid) -> RemoteResult<()>;
}

/// Authentication service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session>;

    async fn sign_up(&self, request: SignUpRequest) -> RemoteResult<SignUpOutcome>;

    async fn sign_out(&self) -> RemoteResult<()>;

    /// The session currently held by the client, if any
    async fn get_session(&self) -> RemoteResult<Option<Session>>;

    /// Stream of auth-state changes. Subscribe before calling `get_session`
    /// to avoid missing a change in between.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
