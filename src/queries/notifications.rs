//! Notification hooks, scoped to the signed-in user.

use super::{check_input, keep_row, parse_row, Outcome, QueryClient, QueryError, QueryResult};
use crate::cache::{QueryKey, QueryScope};
use crate::events::{CrudAction, EntityType};
use crate::remote::{AuthUser, Collection, SelectQuery};
use crate::schema::{NewNotification, Notification};
use serde_json::json;
use uuid::Uuid;

/// How many notifications the list shows
pub const NOTIFICATION_LIMIT: usize = 20;

const MARK_READ: Outcome = Outcome {
    action: "mark notification as read",
    invalidates: &[QueryScope::Notifications],
    success: None,
    failure: Some(("Error", "Failed to mark notification as read")),
};

const CREATE_NOTIFICATION: Outcome = Outcome {
    action: "create notification",
    invalidates: &[QueryScope::Notifications],
    success: None,
    failure: None,
};

impl QueryClient {
    /// The user's latest notifications, newest first. Without a user the list
    /// is empty and the backend is not asked.
    pub async fn list_notifications(&self, user_id: Option<Uuid>) -> QueryResult<Vec<Notification>> {
        let Some(user_id) = user_id else {
            return Ok(Vec::new());
        };
        self.fetch_list(
            QueryKey::scoped(QueryScope::Notifications, user_id),
            Collection::Notifications,
            SelectQuery::newest_first()
                .eq("user_id", user_id.to_string())
                .limit(NOTIFICATION_LIMIT),
            keep_row,
        )
        .await
    }

    /// Mark one notification as read. An id matching no row is a no-op, not
    /// an error: the notification may already be gone.
    pub async fn mark_notification_read(&self, id: Uuid, actor: Option<&AuthUser>) -> QueryResult<Uuid> {
        let result = match self
            .store
            .update(Collection::Notifications, id, json!({ "read": true }))
            .await
        {
            Ok(row) => parse_row::<Notification>(&row).map(Some),
            Err(err) if err.is_not_found() => {
                tracing::debug!(notification_id = %id, "No notification to mark as read");
                Ok(None)
            }
            Err(err) => Err(QueryError::from(err)),
        };
        if let Some(notification) = self.settle(&MARK_READ, result).await? {
            self.publish(
                EntityType::Notification,
                CrudAction::Updated,
                id,
                Some(&notification),
                actor.map(|a| a.id),
            );
        }
        Ok(id)
    }

    /// Insert a notification for some user. Failures are only logged.
    pub async fn create_notification(&self, notification: &NewNotification) -> QueryResult<Notification> {
        let result: QueryResult<Notification> = async {
            let notification = check_input(notification)?;
            let row = serde_json::to_value(&notification)?;
            let stored = self.store.insert(Collection::Notifications, row).await?;
            parse_row::<Notification>(&stored)
        }
        .await;

        let created = self.settle(&CREATE_NOTIFICATION, result).await?;
        self.publish(
            EntityType::Notification,
            CrudAction::Created,
            created.id,
            Some(&created),
            None,
        );
        Ok(created)
    }

    /// Unread notifications among the listed ones
    pub async fn unread_count(&self, user_id: Option<Uuid>) -> QueryResult<usize> {
        let notifications = self.list_notifications(user_id).await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Operation, RemoteError};
    use crate::schema::NotificationType;
    use crate::test_helpers::*;

    #[tokio::test]
    async fn test_no_user_means_no_notifications_and_no_request() {
        let h = Harness::new();
        assert!(h.queries.list_notifications(None).await.unwrap().is_empty());
        assert_eq!(h.queries.unread_count(None).await.unwrap(), 0);
        assert_eq!(h.backend.calls(Collection::Notifications, Operation::Select), 0);
    }

    #[tokio::test]
    async fn test_list_is_scoped_newest_first_and_limited() {
        let h = Harness::new();
        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();
        let mut rows: Vec<_> = (0..25)
            .map(|i| notification_row(me, &format!("n{}", i), i % 2 == 0))
            .collect();
        rows.push(notification_row(someone_else, "not mine", false));
        seed_all(&h.backend, Collection::Notifications, rows).await;

        let listed = h.queries.list_notifications(Some(me)).await.unwrap();
        assert_eq!(listed.len(), NOTIFICATION_LIMIT);
        assert!(listed.iter().all(|n| n.user_id == me));
        assert_eq!(listed[0].title, "n24");
        assert_eq!(listed[19].title, "n5");
    }

    #[tokio::test]
    async fn test_unread_count_counts_listed_unread() {
        let h = Harness::new();
        let me = Uuid::new_v4();
        seed_all(
            &h.backend,
            Collection::Notifications,
            vec![
                notification_row(me, "a", false),
                notification_row(me, "b", true),
                notification_row(me, "c", false),
            ],
        )
        .await;
        assert_eq!(h.queries.unread_count(Some(me)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_is_silent_on_success() {
        let mut h = Harness::new();
        let mut events = h.events.subscribe();
        let me = test_user("Ada");
        let stored = h
            .backend
            .seed(Collection::Notifications, notification_row(me.id, "a", false))
            .await;
        let id: Uuid = stored["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(h.queries.unread_count(Some(me.id)).await.unwrap(), 1);

        h.queries.mark_notification_read(id, Some(&me)).await.unwrap();
        assert!(h.drain_toasts().is_empty());
        assert_eq!(h.queries.unread_count(Some(me.id)).await.unwrap(), 0);

        let event = events.try_recv().unwrap();
        assert_eq!(event.entity_type, EntityType::Notification);
        assert_eq!(event.action, CrudAction::Updated);
        assert_eq!(event.actor_id, Some(me.id.to_string()));
        assert_eq!(event.payload["read"], true);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id_is_a_no_op() {
        let mut h = Harness::new();
        let mut events = h.events.subscribe();
        let id = Uuid::new_v4();

        let marked = h.queries.mark_notification_read(id, None).await.unwrap();
        assert_eq!(marked, id);
        assert_eq!(h.backend.calls(Collection::Notifications, Operation::Update), 1);
        assert!(h.drain_toasts().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mark_read_failure_toasts() {
        let mut h = Harness::new();
        let me = Uuid::new_v4();
        let stored = h
            .backend
            .seed(Collection::Notifications, notification_row(me, "a", false))
            .await;
        let id: Uuid = stored["id"].as_str().unwrap().parse().unwrap();
        h.queries.list_notifications(Some(me)).await.unwrap();
        h.backend
            .fail_on(
                Collection::Notifications,
                Operation::Update,
                RemoteError::new("permission denied for table notifications").with_code("42501"),
            )
            .await;

        let err = h.queries.mark_notification_read(id, None).await.unwrap_err();
        assert_eq!(err.remote().and_then(|e| e.code.as_deref()), Some("42501"));
        assert!(h
            .queries
            .cache()
            .contains(&QueryKey::scoped(QueryScope::Notifications, me))
            .await);
        let toasts = h.drain_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "Error");
        assert_eq!(toasts[0].description, "Failed to mark notification as read");
    }

    #[tokio::test]
    async fn test_create_notification_failure_is_not_toasted() {
        let mut h = Harness::new();
        h.backend
            .fail_on(
                Collection::Notifications,
                Operation::Insert,
                RemoteError::new("new row violates row-level security policy").with_code("42501"),
            )
            .await;
        let notification = NewNotification {
            kind: NotificationType::UserAdded,
            title: "Welcome".into(),
            message: "You were added".into(),
            read: false,
            user_id: Uuid::new_v4(),
            related_task_id: None,
        };
        assert!(h.queries.create_notification(&notification).await.is_err());
        assert!(h.drain_toasts().is_empty());

        h.backend.clear_failures().await;
        let created = h.queries.create_notification(&notification).await.unwrap();
        assert!(!created.read);
        assert_eq!(created.kind, NotificationType::UserAdded);
    }
}
