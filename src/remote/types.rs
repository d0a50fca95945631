//! Types exchanged with the remote backend

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Error code returned when a single-row request matched zero rows
pub const NOT_FOUND_CODE: &str = "PGRST116";

/// Message returned by the auth service when signing out an expired session
pub const SESSION_NOT_FOUND: &str = "Session not found";

/// A backend table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Profiles,
    Tasks,
    Projects,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Profiles,
        Collection::Tasks,
        Collection::Projects,
        Collection::Notifications,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Tasks => "tasks",
            Collection::Projects => "projects",
            Collection::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Error reported by the backend (or by the transport reaching it)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Backend error code (`PGRST116`, `23505`, ...), when one was reported
    pub code: Option<String>,
    pub message: String,
    /// HTTP status, when the error came from an HTTP response
    pub status: Option<u16>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// The error the backend returns when a single row was requested but none matched
    pub fn not_found() -> Self {
        Self::new("JSON object requested, multiple (or no) rows returned")
            .with_code(NOT_FOUND_CODE)
            .with_status(406)
    }

    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(NOT_FOUND_CODE)
    }

    pub fn is_session_not_found(&self) -> bool {
        self.message == SESSION_NOT_FOUND
    }

    /// Transport-level failure (connection refused, timeout, bad body)
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::new(format!("Request failed: {}", err))
    }
}

/// Sort order of a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Filter / order / limit of a select. Filters are equality only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Newest first by `created_at`, the order every list view uses
    pub fn newest_first() -> Self {
        Self::new().order("created_at", false)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Identity known to the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata captured at sign-up (first_name, last_name, role)
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn first_name(&self) -> Option<&str> {
        self.metadata_str("first_name")
    }

    pub fn last_name(&self) -> Option<&str> {
        self.metadata_str("last_name")
    }

    /// Display name derived from metadata, falling back to the email address
    pub fn display_name(&self) -> String {
        match (self.first_name(), self.last_name()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self.email.clone().unwrap_or_else(|| self.id.to_string()),
        }
    }
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

/// Kind of auth-state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChange {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Auth-state change pushed to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub change: AuthChange,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            change: AuthChange::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            change: AuthChange::SignedOut,
            session: None,
        }
    }
}

/// Sign-up request: credentials plus metadata stored on the identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Stored as the identity's `user_metadata`
    pub data: Value,
    /// Where the confirmation email should send the user back to
    #[serde(skip)]
    pub redirect_to: Option<String>,
}

/// Result of a sign-up: the session is absent while the email is unconfirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_found_error() {
        let err = RemoteError::not_found();
        assert!(err.is_not_found());
        assert_eq!(err.status, Some(406));
        assert!(!RemoteError::new("boom").is_not_found());
    }

    #[test]
    fn test_select_query_builder() {
        let q = SelectQuery::newest_first().eq("user_id", "u-1").limit(20);
        assert_eq!(q.filters, vec![("user_id".to_string(), json!("u-1"))]);
        let order = q.order.unwrap();
        assert_eq!(order.column, "created_at");
        assert!(!order.ascending);
        assert_eq!(q.limit, Some(20));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("ada@x.com".into()),
            user_metadata: json!({ "first_name": "Ada", "last_name": "Lovelace" }),
        };
        assert_eq!(user.display_name(), "Ada Lovelace");

        user.user_metadata = json!({ "first_name": "" });
        assert_eq!(user.display_name(), "ada@x.com");

        user.email = None;
        assert_eq!(user.display_name(), user.id.to_string());
    }

    #[test]
    fn test_auth_change_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuthChange::SignedOut).unwrap(),
            "\"SIGNED_OUT\""
        );
        assert_eq!(
            serde_json::to_string(&AuthChange::InitialSession).unwrap(),
            "\"INITIAL_SESSION\""
        );
    }
}
