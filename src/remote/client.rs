//! HTTP backend client
//!
//! Talks to a hosted backend exposing the PostgREST data API under
//! `/rest/v1/<table>` and the GoTrue auth API under `/auth/v1/...`.
//! Every request carries the project's `apikey` header and a bearer token:
//! the signed-in user's access token, or the anon key when signed out.

use super::traits::{AuthBackend, DataStore, RemoteResult};
use super::types::*;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

const AUTH_EVENT_CAPACITY: usize = 64;

/// Media type asking PostgREST for exactly one object instead of an array
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Error body shared (loosely) by PostgREST and GoTrue
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_remote_error(self, status: StatusCode) -> RemoteError {
        let code = self.error_code.or(match self.code {
            Some(Value::String(code)) => Some(code),
            _ => None,
        });
        let message = self
            .message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        RemoteError {
            code,
            message,
            status: Some(status.as_u16()),
        }
    }
}

fn eq_operand(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// reqwest implementation of [`DataStore`] and [`AuthBackend`].
pub struct RestClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    session: RwLock<Option<Session>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http: reqwest::Client::new(),
            session: RwLock::new(None),
            auth_events,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Adopt a session obtained elsewhere (for example restored from disk)
    pub async fn restore_session(&self, session: Session) {
        self.set_session(Some(session.clone())).await;
        let _ = self.auth_events.send(AuthEvent {
            change: AuthChange::InitialSession,
            session: Some(session),
        });
    }

    async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    async fn bearer(&self) -> String {
        match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        }
    }

    /// `/rest/v1/<table>?select=*&...`
    fn table_url(collection: Collection, base: &str, params: &[String]) -> String {
        let mut url = format!("{}/rest/v1/{}?select=*", base, collection.table());
        for param in params {
            url.push('&');
            url.push_str(param);
        }
        url
    }

    fn id_filter(id: Uuid) -> String {
        format!("id=eq.{}", id)
    }

    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await)
    }

    async fn send(request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await.map_err(RemoteError::transport)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
            message: (!text.is_empty()).then_some(text),
            ..Default::default()
        });
        let err = body.into_remote_error(status);
        tracing::debug!(status = %status, code = ?err.code, message = %err.message, "Backend request failed");
        Err(err)
    }

    async fn json_body<T: for<'de> Deserialize<'de>>(response: Response) -> RemoteResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::new(format!("Invalid response body: {}", e)))
    }

    fn session_from(body: Value) -> RemoteResult<Session> {
        serde_json::from_value(body)
            .map_err(|e| RemoteError::new(format!("Invalid session payload: {}", e)))
    }
}

#[async_trait]
impl DataStore for RestClient {
    async fn select(&self, collection: Collection, query: &SelectQuery) -> RemoteResult<Vec<Value>> {
        let mut params: Vec<String> = query
            .filters
            .iter()
            .map(|(column, value)| {
                format!(
                    "{}=eq.{}",
                    urlencoding::encode(column),
                    urlencoding::encode(&eq_operand(value))
                )
            })
            .collect();
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(format!("order={}.{}", urlencoding::encode(&order.column), direction));
        }
        if let Some(limit) = query.limit {
            params.push(format!("limit={}", limit));
        }
        let url = Self::table_url(collection, &self.base_url, &params);
        let response = Self::send(self.request(Method::GET, &url).await).await?;
        Self::json_body(response).await
    }

    async fn select_single(&self, collection: Collection, id: Uuid) -> RemoteResult<Value> {
        let url = Self::table_url(collection, &self.base_url, &[Self::id_filter(id)]);
        let request = self
            .request(Method::GET, &url)
            .await
            .header("Accept", SINGLE_OBJECT);
        let response = Self::send(request).await?;
        Self::json_body(response).await
    }

    async fn insert(&self, collection: Collection, row: Value) -> RemoteResult<Value> {
        let url = Self::table_url(collection, &self.base_url, &[]);
        let request = self
            .request(Method::POST, &url)
            .await
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(&row);
        let response = Self::send(request).await?;
        Self::json_body(response).await
    }

    async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> RemoteResult<Value> {
        let url = Self::table_url(collection, &self.base_url, &[Self::id_filter(id)]);
        let request = self
            .request(Method::PATCH, &url)
            .await
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(&patch);
        let response = Self::send(request).await?;
        Self::json_body(response).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> RemoteResult<()> {
        let url = Self::table_url(collection, &self.base_url, &[Self::id_filter(id)]);
        Self::send(self.request(Method::DELETE, &url).await).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for RestClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let request = self
            .request(Method::POST, &url)
            .await
            .json(&json!({ "email": email, "password": password }));
        let body: Value = Self::json_body(Self::send(request).await?).await?;
        let session = Self::session_from(body)?;

        self.set_session(Some(session.clone())).await;
        let _ = self.auth_events.send(AuthEvent::signed_in(session.clone()));
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(&self, request: SignUpRequest) -> RemoteResult<SignUpOutcome> {
        let mut url = format!("{}/auth/v1/signup", self.base_url);
        if let Some(redirect) = &request.redirect_to {
            url.push_str(&format!("?redirect_to={}", urlencoding::encode(redirect)));
        }
        let http = self.request(Method::POST, &url).await.json(&request);
        let body: Value = Self::json_body(Self::send(http).await?).await?;

        // With email confirmation enabled the service answers with the bare user
        if body.get("access_token").is_some() {
            let session = Self::session_from(body)?;
            self.set_session(Some(session.clone())).await;
            let _ = self.auth_events.send(AuthEvent::signed_in(session.clone()));
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }
        let user_json = body.get("user").cloned().unwrap_or(body);
        let user: AuthUser = serde_json::from_value(user_json)
            .map_err(|e| RemoteError::new(format!("Invalid user payload: {}", e)))?;
        Ok(SignUpOutcome {
            user,
            session: None,
        })
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        let had_session = self.session.read().await.is_some();
        let result = if had_session {
            let url = format!("{}/auth/v1/logout", self.base_url);
            Self::send(self.request(Method::POST, &url).await)
                .await
                .map(|_| ())
        } else {
            Err(RemoteError::new(SESSION_NOT_FOUND).with_status(403))
        };

        // The local session is dropped whatever the server said
        self.set_session(None).await;
        let _ = self.auth_events.send(AuthEvent::signed_out());
        result
    }

    async fn get_session(&self) -> RemoteResult<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}
