//! Test helper factories and in-memory client builders
//!
//! Provides convenience functions for creating rows and inputs with sensible
//! defaults, and a [`Harness`] wiring a [`QueryClient`] to a [`MemoryBackend`].
#![allow(dead_code)]

use crate::cache::QueryCache;
use crate::events::EventBus;
use crate::queries::QueryClient;
use crate::remote::{AuthUser, Collection, MemoryBackend};
use crate::schema::{
    AppRole, CreateProjectInput, CreateTaskInput, CreateUserInput, ProjectPriority,
    ProjectStatus, TaskPriority, TaskStatus,
};
use crate::toast::{Toast, ToastBus};
use crate::{Config, LogFormat};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// Client builders
// ============================================================================

pub fn test_config() -> Config {
    Config {
        remote_url: "http://localhost:54321".to_string(),
        anon_key: "test-anon-key".to_string(),
        profile_timeout_ms: 5000,
        redirect_to: None,
        cache_max_capacity: 64,
        cache_ttl_secs: 300,
        log_format: LogFormat::Text,
    }
}

/// A query client over an empty in-memory backend, with its channels subscribed
pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub queries: QueryClient,
    pub toasts: broadcast::Receiver<Toast>,
    pub events: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::new())
    }

    pub fn with_backend(backend: MemoryBackend) -> Self {
        let backend = Arc::new(backend);
        let toast_bus = ToastBus::default();
        let toasts = toast_bus.subscribe();
        let events = EventBus::default();
        let queries = QueryClient::new(
            backend.clone(),
            backend.clone(),
            QueryCache::default(),
            Arc::new(toast_bus),
        )
        .with_event_emitter(Arc::new(events.clone()));
        Self {
            backend,
            queries,
            toasts,
            events,
        }
    }

    /// Every toast shown so far
    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        let mut shown = Vec::new();
        while let Ok(toast) = self.toasts.try_recv() {
            shown.push(toast);
        }
        shown
    }
}

// ============================================================================
// Row factories
// ============================================================================

pub fn test_user(first_name: &str) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        email: Some(format!("{}@example.com", first_name.to_lowercase())),
        user_metadata: json!({ "first_name": first_name }),
    }
}

pub fn task_row(title: &str, status: TaskStatus) -> Value {
    json!({
        "title": title,
        "status": status.to_string(),
        "priority": "medium",
    })
}

pub fn profile_row(id: Uuid, first_name: &str, role: AppRole) -> Value {
    json!({
        "id": id.to_string(),
        "first_name": first_name,
        "last_name": null,
        "avatar_url": null,
        "role": role.to_string(),
        "updated_at": null,
    })
}

pub fn project_row(name: &str, status: ProjectStatus, owner_id: Uuid) -> Value {
    json!({
        "name": name,
        "description": format!("{} description", name),
        "status": status.to_string(),
        "priority": "medium",
        "owner_id": owner_id.to_string(),
        "due_date": "2025-06-30",
    })
}

pub fn notification_row(user_id: Uuid, title: &str, read: bool) -> Value {
    json!({
        "type": "comment",
        "title": title,
        "message": format!("{} message", title),
        "read": read,
        "user_id": user_id.to_string(),
    })
}

/// Seed rows in order; later rows sort as newer
pub async fn seed_all(backend: &MemoryBackend, collection: Collection, rows: Vec<Value>) {
    for row in rows {
        backend.seed(collection, row).await;
    }
}

// ============================================================================
// Input factories
// ============================================================================

pub fn task_input(title: &str) -> CreateTaskInput {
    CreateTaskInput {
        title: title.to_string(),
        description: None,
        status: TaskStatus::Todo,
        priority: TaskPriority::Medium,
        assignee_id: None,
        due_date: None,
        labels: None,
    }
}

pub fn project_input(name: &str) -> CreateProjectInput {
    CreateProjectInput {
        name: name.to_string(),
        description: "Launch the new site".to_string(),
        status: ProjectStatus::Planning,
        priority: ProjectPriority::High,
        due_date: "2025-06-30".to_string(),
    }
}

pub fn user_input(email: &str) -> CreateUserInput {
    CreateUserInput {
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        email: email.to_string(),
        role: AppRole::Developer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, Task};

    #[tokio::test]
    async fn test_seeded_task_row_validates() {
        let h = Harness::new();
        let stored = h
            .backend
            .seed(Collection::Tasks, task_row("Write docs", TaskStatus::Review))
            .await;
        let task = Task::validate(&stored).unwrap();
        assert_eq!(task.title, "Write docs");
        assert_eq!(task.status, TaskStatus::Review);
    }

    #[test]
    fn test_user_factory() {
        let user = test_user("Ada");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.first_name(), Some("Ada"));
    }
}
