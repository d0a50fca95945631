//! Remote backend access
//!
//! The relational store and its auth service are external collaborators.
//! [`DataStore`] and [`AuthBackend`] describe what the client needs from them;
//! [`RestClient`] speaks HTTP to a hosted backend and [`MemoryBackend`] keeps
//! everything in process.

pub mod client;
pub mod memory;
pub mod traits;
pub mod types;

pub use client::RestClient;
pub use memory::{AuthOperation, MemoryBackend, Operation};
pub use traits::{AuthBackend, DataStore, RemoteResult};
pub use types::*;
