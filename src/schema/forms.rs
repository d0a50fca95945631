//! Form inputs: what users type into dialogs before anything reaches the backend.
//!
//! "Update" forms are partial versions of their "create" forms: every field is
//! optional, but a field that is present obeys the same rule as on create.

use super::enums::*;
use super::validate::{Fields, Presence, Schema, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Minimum length of every password field
pub const MIN_PASSWORD_LEN: usize = 6;

fn present_if(partial: bool) -> Presence {
    if partial {
        Presence::Optional
    } else {
        Presence::Required
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Partial task update; only `Some` fields are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

struct TaskFields {
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    assignee_id: Option<Uuid>,
    due_date: Option<String>,
    labels: Option<Vec<String>>,
}

fn read_task_fields(f: &mut Fields<'_>, partial: bool) -> TaskFields {
    let required = present_if(partial);
    TaskFields {
        title: f.min_len("title", required, 1, "Title is required"),
        description: f.string("description", Presence::Optional),
        status: f.choice("status", required),
        priority: f.choice("priority", required),
        assignee_id: f.uuid("assignee_id", Presence::Optional),
        due_date: f.string("due_date", Presence::Optional),
        labels: f.string_list("labels", Presence::Optional),
    }
}

impl Schema for CreateTaskInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let t = read_task_fields(&mut f, false);
        f.finish(|| {
            Some(CreateTaskInput {
                title: t.title?,
                description: t.description,
                status: t.status?,
                priority: t.priority?,
                assignee_id: t.assignee_id,
                due_date: t.due_date,
                labels: t.labels,
            })
        })
    }
}

impl Schema for UpdateTaskInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let t = read_task_fields(&mut f, true);
        f.finish(|| {
            Some(UpdateTaskInput {
                title: t.title,
                description: t.description,
                status: t.status,
                priority: t.priority,
                assignee_id: t.assignee_id,
                due_date: t.due_date,
                labels: t.labels,
            })
        })
    }
}

impl UpdateTaskInput {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// Users and profiles
// ============================================================================

/// Administrative "add user" form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: AppRole,
}

impl Schema for CreateUserInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let first_name = f.min_len("first_name", Presence::Required, 1, "First name is required");
        let last_name = f.min_len("last_name", Presence::Required, 1, "Last name is required");
        let email = f.email("email", Presence::Required);
        let role = f.choice("role", Presence::Required);
        f.finish(|| {
            Some(CreateUserInput {
                first_name: first_name?,
                last_name: last_name?,
                email: email?,
                role: role?,
            })
        })
    }
}

/// Partial profile row update used by user administration and the settings page.
///
/// `avatar_url` is double-optional: `Some(None)` clears the avatar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AppRole>,
}

impl Schema for ProfilePatch {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let first_name = f.string("first_name", Presence::Optional);
        let last_name = f.string("last_name", Presence::Optional);
        let avatar_present = input.get("avatar_url").is_some();
        let avatar_url = f.string("avatar_url", Presence::Nullish);
        let role = f.choice("role", Presence::Optional);
        f.finish(|| {
            Some(ProfilePatch {
                first_name,
                last_name,
                avatar_url: avatar_present.then_some(avatar_url),
                role,
            })
        })
    }
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Distinguishes an absent key from an explicit `null` on the wire.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Settings page profile form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdateInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Schema for ProfileUpdateInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let first_name = f.min_len("first_name", Presence::Required, 1, "First name is required");
        let last_name = f.min_len("last_name", Presence::Required, 1, "Last name is required");
        let avatar_url = f.url("avatar_url", Presence::Optional);
        f.finish(|| {
            Some(ProfileUpdateInput {
                first_name: first_name?,
                last_name: last_name?,
                avatar_url,
            })
        })
    }
}

impl From<ProfileUpdateInput> for ProfilePatch {
    fn from(input: ProfileUpdateInput) -> Self {
        ProfilePatch {
            first_name: Some(input.first_name),
            last_name: Some(input.last_name),
            avatar_url: input.avatar_url.map(Some),
            role: None,
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

impl Schema for SignInInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let email = f.email("email", Presence::Required);
        let password = f.min_len(
            "password",
            Presence::Required,
            MIN_PASSWORD_LEN,
            "Password must be at least 6 characters",
        );
        f.finish(|| {
            Some(SignInInput {
                email: email?,
                password: password?,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub role: AppRole,
}

impl Schema for SignUpInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let email = f.email("email", Presence::Required);
        let password = f.min_len(
            "password",
            Presence::Required,
            MIN_PASSWORD_LEN,
            "Password must be at least 6 characters",
        );
        let first_name = f.min_len("firstName", Presence::Required, 1, "First name is required");
        let last_name = f.min_len("lastName", Presence::Required, 1, "Last name is required");
        let role = f.choice("role", Presence::Required);
        f.finish(|| {
            Some(SignUpInput {
                email: email?,
                password: password?,
                first_name: first_name?,
                last_name: last_name?,
                role: role?,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChangeInput {
    #[serde(rename = "currentPassword")]
    pub current_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

impl Schema for PasswordChangeInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let current = f.min_len(
            "currentPassword",
            Presence::Required,
            MIN_PASSWORD_LEN,
            "Current password is required",
        );
        let new = f.min_len(
            "newPassword",
            Presence::Required,
            MIN_PASSWORD_LEN,
            "New password must be at least 6 characters",
        );
        let confirm = f.min_len(
            "confirmPassword",
            Presence::Required,
            MIN_PASSWORD_LEN,
            "Please confirm your password",
        );

        // Compared on the raw strings so a mismatch is reported even when a
        // side also fails its length rule.
        let raw = |key: &str| input.get(key).and_then(Value::as_str);
        let (raw_new, raw_confirm) = (raw("newPassword"), raw("confirmPassword"));
        if raw_new.is_some() || raw_confirm.is_some() {
            f.check("confirmPassword", raw_new == raw_confirm, "Passwords don't match");
        }

        f.finish(|| {
            Some(PasswordChangeInput {
                current_password: current?,
                new_password: new?,
                confirm_password: confirm?,
            })
        })
    }
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    pub due_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ProjectPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

struct ProjectFields {
    name: Option<String>,
    description: Option<String>,
    status: Option<ProjectStatus>,
    priority: Option<ProjectPriority>,
    due_date: Option<String>,
}

fn read_project_fields(f: &mut Fields<'_>, partial: bool) -> ProjectFields {
    let required = present_if(partial);
    ProjectFields {
        name: f.min_len("name", required, 1, "Project name is required"),
        description: f.min_len("description", required, 1, "Description is required"),
        status: f.choice("status", required),
        priority: f.choice("priority", required),
        due_date: f.min_len("due_date", required, 1, "Due date is required"),
    }
}

impl Schema for CreateProjectInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let p = read_project_fields(&mut f, false);
        f.finish(|| {
            Some(CreateProjectInput {
                name: p.name?,
                description: p.description?,
                status: p.status?,
                priority: p.priority?,
                due_date: p.due_date?,
            })
        })
    }
}

impl Schema for UpdateProjectInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let p = read_project_fields(&mut f, true);
        f.finish(|| {
            Some(UpdateProjectInput {
                name: p.name,
                description: p.description,
                status: p.status,
                priority: p.priority,
                due_date: p.due_date,
            })
        })
    }
}

// ============================================================================
// Landing page
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFormInput {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub message: String,
}

impl Schema for ContactFormInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let name = f.min_len("name", Presence::Required, 1, "Name is required");
        let email = f.email("email", Presence::Required);
        let company = f.string("company", Presence::Optional);
        let message = f.min_len(
            "message",
            Presence::Required,
            10,
            "Message must be at least 10 characters",
        );
        f.finish(|| {
            Some(ContactFormInput {
                name: name?,
                email: email?,
                company,
                message: message?,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterInput {
    pub email: String,
}

impl Schema for NewsletterInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let email = f.email("email", Presence::Required);
        f.finish(|| Some(NewsletterInput { email: email? }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoRequestInput {
    pub name: String,
    pub email: String,
    pub company: String,
    #[serde(rename = "teamSize")]
    pub team_size: TeamSize,
    #[serde(rename = "useCase")]
    pub use_case: String,
}

impl Schema for DemoRequestInput {
    fn validate(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input);
        let name = f.min_len("name", Presence::Required, 1, "Name is required");
        let email = f.email("email", Presence::Required);
        let company = f.min_len("company", Presence::Required, 1, "Company name is required");
        let team_size = f.choice("teamSize", Presence::Required);
        let use_case = f.min_len(
            "useCase",
            Presence::Required,
            10,
            "Please describe your use case",
        );
        f.finish(|| {
            Some(DemoRequestInput {
                name: name?,
                email: email?,
                company: company?,
                team_size: team_size?,
                use_case: use_case?,
            })
        })
    }
}
