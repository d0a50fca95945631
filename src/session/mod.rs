//! Auth/session controller

mod controller;
mod state;

pub use controller::{SessionConfig, SessionController, SignUpDetails, DEFAULT_PROFILE_TIMEOUT};
pub use state::{ProfileRequest, SessionSnapshot, SessionState};
