//! Broadcast of mutation events to open views

use super::{CrudEvent, EventEmitter};
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 1024;

/// Fans every [`CrudEvent`] out to the views currently subscribed.
///
/// A view that subscribes late only sees mutations made after it subscribed;
/// it reads the current list through the query cache first. Events raised
/// while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CrudEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrudEvent> {
        self.sender.subscribe()
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: CrudEvent) {
        let (entity, action) = (event.entity_type, event.action);
        match self.sender.send(event) {
            Ok(views) => debug!(entity_type = ?entity, action = ?action, views, "Mutation broadcast"),
            Err(_) => debug!(entity_type = ?entity, action = ?action, "Mutation with no open view"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{CrudAction, EntityType};
    use crate::remote::{Collection, Operation, RemoteError};
    use crate::test_helpers::*;

    #[tokio::test]
    async fn test_mutation_without_open_view_still_succeeds() {
        let h = Harness::new();
        let task = h
            .queries
            .create_task(&task_input("Nobody is watching"), None)
            .await
            .unwrap();
        assert_eq!(task.title, "Nobody is watching");
    }

    #[tokio::test]
    async fn test_every_open_view_sees_the_mutation() {
        let h = Harness::new();
        let mut board = h.events.subscribe();
        let mut dashboard = h.events.subscribe();
        let actor = test_user("Grace");

        let project = h
            .queries
            .create_project(&project_input("Website"), Some(&actor))
            .await
            .unwrap();

        for rx in [&mut board, &mut dashboard] {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.entity_type, EntityType::Project);
            assert_eq!(event.action, CrudAction::Created);
            assert_eq!(event.entity_id, project.id.to_string());
            assert_eq!(event.actor_id, Some(actor.id.to_string()));
            assert_eq!(event.payload["name"], "Website");
        }
    }

    #[tokio::test]
    async fn test_events_follow_mutation_order() {
        let h = Harness::new();
        let mut rx = h.events.subscribe();

        let task = h.queries.create_task(&task_input("Short-lived"), None).await.unwrap();
        h.queries.delete_task(task.id, None).await.unwrap();

        let created = rx.try_recv().unwrap();
        let deleted = rx.try_recv().unwrap();
        assert_eq!(created.action, CrudAction::Created);
        assert_eq!(deleted.action, CrudAction::Deleted);
        assert_eq!(deleted.entity_id, created.entity_id);
        assert!(deleted.payload.is_null());
    }

    #[tokio::test]
    async fn test_failed_mutation_raises_no_event() {
        let h = Harness::new();
        let mut rx = h.events.subscribe();
        h.backend
            .fail_on(
                Collection::Tasks,
                Operation::Insert,
                RemoteError::new("connection reset").with_status(503),
            )
            .await;

        assert!(h.queries.create_task(&task_input("Lost"), None).await.is_err());
        assert!(rx.try_recv().is_err());
    }
}
