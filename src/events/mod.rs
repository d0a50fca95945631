//! Mutation event system
//!
//! This module provides:
//! - `CrudEvent`: typed events emitted after every successful mutation
//! - `EventEmitter`: fire-and-forget sink trait
//! - `EventBus`: broadcast channel distributing events to views

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{CrudAction, CrudEvent, EntityType, EventEmitter};
