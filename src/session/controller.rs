//! Session controller
//!
//! Owns the signed-in identity, its profile and the `loading` flag. The flag
//! is driven by three sources: the backend's auth-change stream, a profile
//! fetch started for every session it reports, and a ceiling timer that stops
//! a slow fetch from blocking the UI. Whichever of fetch and timer finishes
//! first clears the flag; a profile arriving after the timer still lands.

use super::state::{ProfileRequest, SessionSnapshot, SessionState};
use crate::queries::{QueryClient, QueryError, QueryResult};
use crate::remote::{AuthEvent, AuthUser, Session, SignUpOutcome};
use crate::schema::{AppRole, Profile, ProfilePatch, SignInInput, SignUpInput};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default ceiling on how long a profile fetch may hold `loading`
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub profile_timeout: Duration,
    /// Passed along with sign-ups for the confirmation email
    pub redirect_to: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
            redirect_to: None,
        }
    }
}

/// Name and role captured on the sign-up form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpDetails {
    pub first_name: String,
    pub last_name: String,
    pub role: AppRole,
}

struct Inner {
    queries: QueryClient,
    config: SessionConfig,
    state: Mutex<SessionState>,
    snapshot: watch::Sender<SessionSnapshot>,
    cancel: CancellationToken,
}

impl Inner {
    fn publish(&self, state: &SessionState) {
        self.snapshot.send_replace(state.snapshot());
    }

    async fn apply_session(self: &Arc<Self>, session: Option<Session>) {
        let request = {
            let mut state = self.state.lock().await;
            let request = state.on_session(session);
            self.publish(&state);
            request
        };
        if let Some(request) = request {
            self.spawn_profile_fetch(request);
            self.spawn_ceiling(request.generation);
        }
    }

    fn spawn_profile_fetch(self: &Arc<Self>, request: ProfileRequest) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = inner.cancel.cancelled() => return,
                result = inner.queries.load_profile(request.user_id) => result,
            };
            let profile = match result {
                Ok(Some(profile)) => Some(profile),
                Ok(None) => {
                    debug!(user_id = %request.user_id, "No profile row for user");
                    None
                }
                Err(e) => {
                    warn!(user_id = %request.user_id, error = %e, "Failed to fetch profile");
                    None
                }
            };
            if inner.cancel.is_cancelled() {
                return;
            }
            let mut state = inner.state.lock().await;
            if state.on_profile(request.generation, profile) {
                inner.publish(&state);
            } else {
                debug!(generation = request.generation, "Discarding stale profile result");
            }
        });
    }

    fn spawn_ceiling(self: &Arc<Self>, generation: u64) {
        let inner = Arc::clone(self);
        let timeout = self.config.profile_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => return,
                _ = tokio::time::sleep(timeout) => {}
            }
            let mut state = inner.state.lock().await;
            if state.on_timeout(generation) {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Profile fetch still running, no longer blocking on it"
                );
                inner.publish(&state);
            }
        });
    }

    async fn resync(self: &Arc<Self>) {
        match self.queries.auth().get_session().await {
            Ok(session) => self.apply_session(session).await,
            Err(e) => warn!(error = %e, "Failed to re-read session"),
        }
    }

    async fn run_events(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        debug!(change = ?event.change, has_session = event.session.is_some(), "Auth event");
                        self.apply_session(event.session).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Auth events dropped, re-reading session");
                        self.resync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        debug!("Auth event loop stopped");
    }
}

/// Explicitly constructed session context. Consumers read it through
/// [`SessionController::snapshot`] or subscribe to changes.
pub struct SessionController {
    inner: Arc<Inner>,
    event_loop: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Subscribe to auth changes, then ask the backend for the current session.
    pub async fn start(queries: QueryClient, config: SessionConfig) -> Self {
        let events = queries.auth().subscribe();
        let initial = SessionState::new();
        let (snapshot, _) = watch::channel(initial.snapshot());
        let inner = Arc::new(Inner {
            queries,
            config,
            state: Mutex::new(initial),
            snapshot,
            cancel: CancellationToken::new(),
        });
        let event_loop = tokio::spawn(Arc::clone(&inner).run_events(events));

        match inner.queries.auth().get_session().await {
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, "Existing session found");
                inner.apply_session(Some(session)).await;
            }
            Ok(None) => {
                let mut state = inner.state.lock().await;
                state.on_no_initial_session();
                inner.publish(&state);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read initial session");
                let mut state = inner.state.lock().await;
                state.on_no_initial_session();
                inner.publish(&state);
            }
        }

        Self {
            inner,
            event_loop: std::sync::Mutex::new(Some(event_loop)),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.snapshot.borrow().user.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.snapshot.borrow().loading
    }

    /// Wait until `loading` clears and return the settled snapshot
    pub async fn wait_until_loaded(&self) -> SessionSnapshot {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|s| !s.loading).await {
            Ok(snapshot) => snapshot.clone(),
            // The sender lives as long as `self`
            Err(_) => self.snapshot(),
        };
        settled
    }

    pub fn queries(&self) -> &QueryClient {
        &self.inner.queries
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        details: SignUpDetails,
    ) -> QueryResult<SignUpOutcome> {
        let input = SignUpInput {
            email: email.to_string(),
            password: password.to_string(),
            first_name: details.first_name,
            last_name: details.last_name,
            role: details.role,
        };
        let outcome = self
            .inner
            .queries
            .sign_up(&input, self.inner.config.redirect_to.clone())
            .await?;
        if let Some(session) = &outcome.session {
            self.inner.apply_session(Some(session.clone())).await;
        }
        Ok(outcome)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> QueryResult<Session> {
        let input = SignInInput {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session = self.inner.queries.sign_in(&input).await?;
        self.inner.apply_session(Some(session.clone())).await;
        Ok(session)
    }

    /// Sign out. Always completes: a backend failure is toasted and logged,
    /// and local state is cleared regardless.
    pub async fn sign_out(&self) {
        if let Err(e) = self.inner.queries.sign_out().await {
            debug!(error = %e, "Sign-out failed remotely, clearing local session anyway");
        }
        self.inner.apply_session(None).await;
    }

    /// Update the signed-in user's profile. `loading` stays raised while the
    /// update runs.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> QueryResult<Profile> {
        let Some(user) = self.current_user() else {
            return Err(QueryError::NotAuthenticated("No user logged in".to_string()));
        };

        {
            let mut state = self.inner.state.lock().await;
            state.set_profile_update_pending(true);
            self.inner.publish(&state);
        }
        let result = self.inner.queries.update_profile(user.id, patch).await;

        let mut state = self.inner.state.lock().await;
        state.set_profile_update_pending(false);
        if let Ok(profile) = &result {
            state.on_profile_updated(profile.clone());
        }
        self.inner.publish(&state);
        result
    }

    /// Stop the event loop; results of fetches still in flight are dropped.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self
            .event_loop
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Auth event loop ended abnormally");
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}
