//! Session state machine
//!
//! Pure bookkeeping for the session controller. Every session change bumps a
//! generation counter; profile results and ceiling timeouts carry the
//! generation they were started for and are ignored once it is stale.

use crate::remote::{AuthUser, Session};
use crate::schema::Profile;
use serde::Serialize;
use uuid::Uuid;

/// A profile fetch the controller has to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileRequest {
    pub generation: u64,
    pub user_id: Uuid,
}

/// What consumers observe
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub user: Option<AuthUser>,
    #[serde(skip)]
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Profile name, else the identity's metadata name, else its email
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.profile.as_ref().and_then(Profile::full_name) {
            return Some(name);
        }
        self.user.as_ref().map(AuthUser::display_name)
    }
}

#[derive(Debug)]
pub struct SessionState {
    session: Option<Session>,
    profile: Option<Profile>,
    generation: u64,
    profile_in_flight: bool,
    loading: bool,
    profile_update_pending: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Loading, no session: nothing is known until the first auth answer
    pub fn new() -> Self {
        Self {
            session: None,
            profile: None,
            generation: 0,
            profile_in_flight: false,
            loading: true,
            profile_update_pending: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session_present(&self) -> bool {
        self.session.is_some()
    }

    pub fn profile_in_flight(&self) -> bool {
        self.profile_in_flight
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Loading as consumers see it: the session is settling or a profile
    /// update is running
    pub fn loading(&self) -> bool {
        self.loading || self.profile_update_pending
    }

    /// An auth event (or the startup check) reported `session`.
    ///
    /// With a session a profile fetch must start; without one the state
    /// settles immediately. The exact session already held is a no-op, so the
    /// controller can apply its own sign-in before the matching event arrives.
    pub fn on_session(&mut self, session: Option<Session>) -> Option<ProfileRequest> {
        if session.is_some() && session == self.session {
            return None;
        }
        self.generation += 1;
        match session {
            Some(session) => {
                let user_id = session.user.id;
                if self.user().map(|u| u.id) != Some(user_id) {
                    self.profile = None;
                }
                self.session = Some(session);
                self.profile_in_flight = true;
                self.loading = true;
                Some(ProfileRequest {
                    generation: self.generation,
                    user_id,
                })
            }
            None => {
                self.session = None;
                self.profile = None;
                self.profile_in_flight = false;
                self.loading = false;
                None
            }
        }
    }

    /// The startup check found no session. Only settles if no event has
    /// delivered one in the meantime.
    pub fn on_no_initial_session(&mut self) {
        if self.session.is_none() {
            self.loading = false;
        }
    }

    /// A profile fetch finished. `None` covers both "no profile row" and a
    /// failed fetch. Returns whether the result was applied.
    pub fn on_profile(&mut self, generation: u64, profile: Option<Profile>) -> bool {
        if generation != self.generation || self.session.is_none() {
            return false;
        }
        self.profile = profile;
        self.profile_in_flight = false;
        self.loading = false;
        true
    }

    /// The ceiling timer of `generation` fired. Returns whether it unblocked
    /// loading (the fetch was still running).
    pub fn on_timeout(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.profile_in_flight || !self.loading {
            return false;
        }
        self.loading = false;
        true
    }

    pub fn set_profile_update_pending(&mut self, pending: bool) {
        self.profile_update_pending = pending;
    }

    /// A profile update succeeded for the signed-in user
    pub fn on_profile_updated(&mut self, profile: Profile) {
        if self.user().map(|u| u.id) == Some(profile.id) {
            self.profile = Some(profile);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user().cloned(),
            session: self.session.clone(),
            profile: self.profile.clone(),
            loading: self.loading(),
        }
    }
}
