//! Dashboard search and filter inputs.
//!
//! Filters are applied client-side to already fetched lists; every criterion
//! that is set must match.

use super::enums::*;
use super::models::{Profile, Project, Task};
use super::validate::{Fields, Presence, Schema, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl Schema for TaskFilter {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let status = f.choice("status", Presence::Optional);
        let priority = f.choice("priority", Presence::Optional);
        let assignee_id = f.uuid("assignee_id", Presence::Optional);
        let search = f.string("search", Presence::Optional);
        let labels = f.string_list("labels", Presence::Optional);
        f.finish(|| {
            Some(TaskFilter {
                status,
                priority,
                assignee_id,
                search,
                labels,
            })
        })
    }
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|s| s != task.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != task.priority) {
            return false;
        }
        if self.assignee_id.is_some() && self.assignee_id != task.assignee_id {
            return false;
        }
        if let Some(q) = self.search.as_deref().filter(|q| !q.is_empty()) {
            let in_title = contains_ci(&task.title, q);
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| contains_ci(d, q));
            if !in_title && !in_description {
                return false;
            }
        }
        if let Some(wanted) = &self.labels {
            let have = task.labels.as_deref().unwrap_or_default();
            if !wanted.iter().all(|l| have.contains(l)) {
                return false;
            }
        }
        true
    }

    /// Keep the tasks matching this filter, preserving order
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ProjectPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Schema for ProjectFilter {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let status = f.choice("status", Presence::Optional);
        let priority = f.choice("priority", Presence::Optional);
        let owner_id = f.uuid("owner_id", Presence::Optional);
        let search = f.string("search", Presence::Optional);
        f.finish(|| {
            Some(ProjectFilter {
                status,
                priority,
                owner_id,
                search,
            })
        })
    }
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        if self.status.is_some_and(|s| s != project.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != project.priority) {
            return false;
        }
        if self.owner_id.is_some_and(|o| o != project.owner_id) {
            return false;
        }
        match self.search.as_deref().filter(|q| !q.is_empty()) {
            Some(q) => contains_ci(&project.name, q) || contains_ci(&project.description, q),
            None => true,
        }
    }

    pub fn apply<'a>(&self, projects: &'a [Project]) -> Vec<&'a Project> {
        projects.iter().filter(|p| self.matches(p)).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AppRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Schema for UserFilter {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let role = f.choice("role", Presence::Optional);
        let search = f.string("search", Presence::Optional);
        f.finish(|| Some(UserFilter { role, search }))
    }
}

impl UserFilter {
    pub fn matches(&self, profile: &Profile) -> bool {
        if self.role.is_some_and(|r| r != profile.role) {
            return false;
        }
        match self.search.as_deref().filter(|q| !q.is_empty()) {
            Some(q) => profile.full_name().is_some_and(|n| contains_ci(&n, q)),
            None => true,
        }
    }

    pub fn apply<'a>(&self, profiles: &'a [Profile]) -> Vec<&'a Profile> {
        profiles.iter().filter(|p| self.matches(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(title: &str, status: TaskStatus, labels: &[&str]) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: Some("Quarterly planning".into()),
            status,
            priority: TaskPriority::Medium,
            assignee_id: None,
            assignee_name: None,
            assignee_avatar: None,
            due_date: None,
            labels: Some(labels.iter().map(|s| s.to_string()).collect()),
            comments_count: None,
            attachments_count: None,
            created_at: None,
            updated_at: None,
            created_by: None,
        }
    }

    #[test]
    fn test_task_filter_combines_criteria() {
        let tasks = vec![
            task("Fix login", TaskStatus::Todo, &["bug", "auth"]),
            task("Write docs", TaskStatus::Todo, &["docs"]),
            task("Fix logout", TaskStatus::Done, &["bug"]),
        ];

        let filter = TaskFilter::validate(&json!({ "status": "todo", "labels": ["bug"] })).unwrap();
        let hits = filter.apply(&tasks);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Fix login");

        let search = TaskFilter {
            search: Some("FIX".into()),
            ..Default::default()
        };
        assert_eq!(search.apply(&tasks).len(), 2);

        let by_description = TaskFilter {
            search: Some("quarterly".into()),
            ..Default::default()
        };
        assert_eq!(by_description.apply(&tasks).len(), 3);

        assert_eq!(TaskFilter::default().apply(&tasks).len(), 3);
    }

    #[test]
    fn test_filter_schema_rejects_bad_enum() {
        assert!(TaskFilter::validate(&json!({ "status": "blocked" })).is_err());
        assert!(ProjectFilter::validate(&json!({ "priority": "urgent" })).is_err());
        assert!(UserFilter::validate(&json!({ "role": "guest" })).is_err());
    }

    #[test]
    fn test_user_filter_search_by_name() {
        let profile = Profile {
            id: Uuid::new_v4(),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            avatar_url: None,
            role: AppRole::Developer,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: None,
        };
        let filter = UserFilter {
            role: Some(AppRole::Developer),
            search: Some("love".into()),
        };
        assert!(filter.matches(&profile));

        let wrong_role = UserFilter {
            role: Some(AppRole::Admin),
            search: None,
        };
        assert!(!wrong_role.matches(&profile));
    }
}
