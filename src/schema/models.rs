//! Canonical domain records as stored by the backend.
//!
//! These are the shapes every remote response is re-validated against before a
//! hook reports success.

use super::enums::*;
use super::validate::{Fields, Presence, Schema, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Base URL of the generated avatar service
pub const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg";

/// Display name used while a project's owner has not been joined in
pub const UNKNOWN_OWNER_NAME: &str = "Unknown";

/// Seed used for the avatar of an unresolved owner
pub const UNKNOWN_OWNER_SEED: &str = "unknown";

/// Generated avatar URL for a seed (usually an email address)
pub fn avatar_url(seed: &str) -> String {
    format!("{}?seed={}", AVATAR_BASE_URL, seed)
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: AppRole,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl Profile {
    /// "First Last", skipping missing parts; `None` when both are missing
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

impl Schema for Profile {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let id = f.uuid("id", Presence::Required);
        let first_name = f.string("first_name", Presence::Nullable);
        let last_name = f.string("last_name", Presence::Nullable);
        let avatar_url = f.string("avatar_url", Presence::Nullable);
        let role = f.choice::<AppRole>("role", Presence::Required);
        let created_at = f.string("created_at", Presence::Required);
        let updated_at = f.string("updated_at", Presence::Nullable);
        f.finish(|| {
            Some(Profile {
                id: id?,
                first_name,
                last_name,
                avatar_url,
                role: role?,
                created_at: created_at?,
                updated_at,
            })
        })
    }
}

// ============================================================================
// Task
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Never empty once validated
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

impl Schema for Task {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let id = f.uuid("id", Presence::Required);
        let title = f.min_len("title", Presence::Required, 1, "Title is required");
        let description = f.string("description", Presence::Nullish);
        let status = f.choice::<TaskStatus>("status", Presence::Required);
        let priority = f.choice::<TaskPriority>("priority", Presence::Required);
        let assignee_id = f.uuid("assignee_id", Presence::Nullish);
        let assignee_name = f.string("assignee_name", Presence::Nullish);
        let assignee_avatar = f.string("assignee_avatar", Presence::Nullish);
        let due_date = f.string("due_date", Presence::Nullish);
        let labels = f.string_list("labels", Presence::Nullish);
        let comments_count = f.count("comments_count", Presence::Nullish);
        let attachments_count = f.count("attachments_count", Presence::Nullish);
        let created_at = f.string("created_at", Presence::Optional);
        let updated_at = f.string("updated_at", Presence::Optional);
        let created_by = f.uuid("created_by", Presence::Optional);
        f.finish(|| {
            Some(Task {
                id: id?,
                title: title?,
                description,
                status: status?,
                priority: priority?,
                assignee_id,
                assignee_name,
                assignee_avatar,
                due_date,
                labels,
                comments_count,
                attachments_count,
                created_at,
                updated_at,
                created_by,
            })
        })
    }
}

// ============================================================================
// Project
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub owner_avatar: String,
    /// Always empty: the backend has no membership table yet
    pub team_members: Vec<String>,
    pub due_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Project {
    /// Whether the owner fields are the "Unknown" placeholder rather than a name
    pub fn owner_unresolved(&self) -> bool {
        self.owner_name == UNKNOWN_OWNER_NAME
    }
}

impl Schema for Project {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let id = f.uuid("id", Presence::Required);
        let name = f.string("name", Presence::Required);
        let description = f.string("description", Presence::Required);
        let status = f.choice::<ProjectStatus>("status", Presence::Required);
        let priority = f.choice::<ProjectPriority>("priority", Presence::Required);
        let owner_id = f.uuid("owner_id", Presence::Required);
        let owner_name = f.string("owner_name", Presence::Required);
        let owner_avatar = f.string("owner_avatar", Presence::Required);
        let team_members = f.string_list("team_members", Presence::Required);
        let due_date = f.string("due_date", Presence::Required);
        let created_at = f.string("created_at", Presence::Required);
        let updated_at = f.string("updated_at", Presence::Required);
        f.finish(|| {
            Some(Project {
                id: id?,
                name: name?,
                description: description?,
                status: status?,
                priority: priority?,
                owner_id: owner_id?,
                owner_name: owner_name?,
                owner_avatar: owner_avatar?,
                team_members: team_members?,
                due_date: due_date?,
                created_at: created_at?,
                updated_at: updated_at?,
            })
        })
    }
}

/// Where a project's owner display fields come from.
///
/// The backend row only carries `owner_id`; no join against profiles is
/// performed, so the display fields are synthesized on the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerPlaceholder {
    /// Owner not joined in: "Unknown" and the `unknown` avatar
    Unresolved,
    /// Right after creation the acting user is known to be the owner
    ActingUser {
        first_name: Option<String>,
        avatar_seed: String,
    },
}

impl OwnerPlaceholder {
    pub fn owner_name(&self) -> String {
        match self {
            Self::Unresolved => UNKNOWN_OWNER_NAME.to_string(),
            Self::ActingUser { first_name, .. } => first_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_OWNER_NAME.to_string()),
        }
    }

    pub fn owner_avatar(&self) -> String {
        match self {
            Self::Unresolved => avatar_url(UNKNOWN_OWNER_SEED),
            Self::ActingUser { avatar_seed, .. } => avatar_url(avatar_seed),
        }
    }

    /// Fill the client-side fields of a raw project row in place.
    ///
    /// Non-object rows are left untouched so that validation reports them.
    pub fn apply(&self, row: &mut Value) {
        if let Value::Object(map) = row {
            map.insert("team_members".into(), Value::Array(vec![]));
            map.insert("owner_name".into(), Value::String(self.owner_name()));
            map.insert("owner_avatar".into(), Value::String(self.owner_avatar()));
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: String,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<Uuid>,
}

impl Schema for Notification {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let id = f.uuid("id", Presence::Required);
        let kind = f.choice::<NotificationType>("type", Presence::Required);
        let title = f.string("title", Presence::Required);
        let message = f.string("message", Presence::Required);
        let read = f.boolean("read", Presence::Required);
        let created_at = f.string("created_at", Presence::Required);
        let user_id = f.uuid("user_id", Presence::Required);
        let related_task_id = f.uuid("related_task_id", Presence::Nullish);
        f.finish(|| {
            Some(Notification {
                id: id?,
                kind: kind?,
                title: title?,
                message: message?,
                read: read?,
                created_at: created_at?,
                user_id: user_id?,
                related_task_id,
            })
        })
    }
}

/// A notification about to be inserted (id and timestamp come from the backend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<Uuid>,
}

impl Schema for NewNotification {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let kind = f.choice::<NotificationType>("type", Presence::Required);
        let title = f.string("title", Presence::Required);
        let message = f.string("message", Presence::Required);
        let read = f.boolean("read", Presence::Optional);
        let user_id = f.uuid("user_id", Presence::Required);
        let related_task_id = f.uuid("related_task_id", Presence::Nullish);
        f.finish(|| {
            Some(NewNotification {
                kind: kind?,
                title: title?,
                message: message?,
                read: read.unwrap_or(false),
                user_id: user_id?,
                related_task_id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate::validate_array;
    use serde_json::json;

    fn profile_row() -> Value {
        json!({
            "id": "7f1c1e2a-6a7d-4d0e-9a57-0c2f3a1b4d5e",
            "first_name": "Ada",
            "last_name": null,
            "avatar_url": null,
            "role": "developer",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": null
        })
    }

    fn task_row(title: &str) -> Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "title": title,
            "description": null,
            "status": "todo",
            "priority": "high",
            "assignee_id": null,
            "due_date": null,
            "labels": ["backend"],
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
            "created_by": "7f1c1e2a-6a7d-4d0e-9a57-0c2f3a1b4d5e"
        })
    }

    #[test]
    fn test_profile_accepts_nullable_fields() {
        let p = Profile::validate(&profile_row()).unwrap();
        assert_eq!(p.role, AppRole::Developer);
        assert_eq!(p.first_name.as_deref(), Some("Ada"));
        assert!(p.last_name.is_none());
        assert_eq!(p.full_name().as_deref(), Some("Ada"));
    }

    #[test]
    fn test_profile_nullable_keys_must_be_present() {
        let mut row = profile_row();
        row.as_object_mut().unwrap().remove("last_name");
        let err = Profile::validate(&row).unwrap_err();
        assert_eq!(err.messages_for("last_name"), vec!["Required"]);
    }

    #[test]
    fn test_profile_rejects_unknown_role() {
        let mut row = profile_row();
        row["role"] = json!("owner");
        let err = Profile::validate(&row).unwrap_err();
        assert!(err.has_field("role"));
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_task_row_roundtrip_fields() {
        let task = Task::validate(&task_row("Ship it")).unwrap();
        assert_eq!(task.title, "Ship it");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.labels, Some(vec!["backend".to_string()]));
        assert!(task.description.is_none());
        assert!(task.created_by.is_some());
    }

    #[test]
    fn test_task_row_with_empty_title_rejected() {
        let err = Task::validate(&task_row("")).unwrap_err();
        assert_eq!(err.messages_for("title"), vec!["Title is required"]);
    }

    #[test]
    fn test_task_array_fails_on_single_bad_row() {
        let rows = json!([task_row("a"), task_row("b"), task_row("")]);
        let err = validate_array::<Task>(&rows).unwrap_err();
        assert!(err.has_field("2.title"));

        let rows = json!([task_row("a"), task_row("b")]);
        assert_eq!(validate_array::<Task>(&rows).unwrap().len(), 2);
    }

    #[test]
    fn test_owner_placeholder_unresolved() {
        let mut row = json!({
            "id": Uuid::new_v4().to_string(),
            "name": "Apollo",
            "description": "Moonshot",
            "status": "active",
            "priority": "high",
            "owner_id": Uuid::new_v4().to_string(),
            "due_date": "2024-12-31",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        });
        assert!(Project::validate(&row).is_err());

        OwnerPlaceholder::Unresolved.apply(&mut row);
        let project = Project::validate(&row).unwrap();
        assert!(project.owner_unresolved());
        assert!(project.team_members.is_empty());
        assert_eq!(
            project.owner_avatar,
            "https://api.dicebear.com/7.x/avataaars/svg?seed=unknown"
        );
    }

    #[test]
    fn test_owner_placeholder_acting_user() {
        let owner = OwnerPlaceholder::ActingUser {
            first_name: Some("Grace".into()),
            avatar_seed: "grace@navy.mil".into(),
        };
        assert_eq!(owner.owner_name(), "Grace");
        assert!(owner.owner_avatar().ends_with("seed=grace@navy.mil"));

        let nameless = OwnerPlaceholder::ActingUser {
            first_name: None,
            avatar_seed: "x@y.io".into(),
        };
        assert_eq!(nameless.owner_name(), UNKNOWN_OWNER_NAME);
    }

    #[test]
    fn test_notification_type_key() {
        let row = json!({
            "id": Uuid::new_v4().to_string(),
            "type": "deadline",
            "title": "Due soon",
            "message": "Task X is due tomorrow",
            "read": false,
            "created_at": "2024-03-01T10:00:00Z",
            "user_id": Uuid::new_v4().to_string()
        });
        let n = Notification::validate(&row).unwrap();
        assert_eq!(n.kind, NotificationType::Deadline);
        assert!(n.related_task_id.is_none());

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "deadline");
    }
}
