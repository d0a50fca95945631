//! Project hooks.
//!
//! Project rows carry only `owner_id`. The owner's display fields are filled on
//! the client: "Unknown" for anything read back from the backend, the acting
//! user's own details right after they create a project.

use super::{check_input, parse_row, Outcome, QueryClient, QueryError, QueryResult};
use crate::cache::{QueryKey, QueryScope};
use crate::events::{CrudAction, EntityType};
use crate::remote::{AuthUser, Collection, SelectQuery};
use crate::schema::{
    CreateProjectInput, OwnerPlaceholder, Project, ProjectStatus, UpdateProjectInput,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const CREATE_PROJECT: Outcome = Outcome {
    action: "create project",
    invalidates: &[QueryScope::Projects],
    success: Some(("Success", "Project created successfully")),
    failure: Some(("Error", "Failed to create project")),
};

const UPDATE_PROJECT: Outcome = Outcome {
    action: "update project",
    invalidates: &[QueryScope::Projects],
    success: Some(("Success", "Project updated successfully")),
    failure: Some(("Error", "Failed to update project")),
};

const DELETE_PROJECT: Outcome = Outcome {
    action: "delete project",
    invalidates: &[QueryScope::Projects],
    success: Some(("Success", "Project deleted successfully")),
    failure: Some(("Error", "Failed to delete project")),
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub active: usize,
    pub completed: usize,
    pub total: usize,
    /// Completed share of all projects, as a rounded percentage
    pub completion_rate: u32,
}

impl ProjectStats {
    pub fn from_projects(projects: &[Project]) -> Self {
        let total = projects.len();
        let count = |status| projects.iter().filter(|p| p.status == status).count();
        let completed = count(ProjectStatus::Completed);
        let completion_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        ProjectStats {
            active: count(ProjectStatus::Active),
            completed,
            total,
            completion_rate,
        }
    }
}

fn unresolved_owner(row: &mut Value) {
    OwnerPlaceholder::Unresolved.apply(row);
}

fn parse_project(mut row: Value, owner: &OwnerPlaceholder) -> QueryResult<Project> {
    owner.apply(&mut row);
    parse_row::<Project>(&row)
}

impl QueryClient {
    /// All projects, newest first, with unresolved owners
    pub async fn list_projects(&self) -> QueryResult<Vec<Project>> {
        self.fetch_list(
            QueryKey::all(QueryScope::Projects),
            Collection::Projects,
            SelectQuery::newest_first(),
            unresolved_owner,
        )
        .await
    }

    /// Create a project owned by the acting user. Fails without one.
    pub async fn create_project(
        &self,
        input: &CreateProjectInput,
        actor: Option<&AuthUser>,
    ) -> QueryResult<Project> {
        let result: QueryResult<Project> = async {
            let actor = actor.ok_or_else(QueryError::not_authenticated)?;
            let input = check_input(input)?;
            let mut row = serde_json::to_value(&input)?;
            if let Value::Object(map) = &mut row {
                map.insert("owner_id".into(), Value::String(actor.id.to_string()));
            }
            let stored = self.store.insert(Collection::Projects, row).await?;
            let owner = OwnerPlaceholder::ActingUser {
                first_name: actor.first_name().map(str::to_string),
                avatar_seed: actor.email.clone().unwrap_or_default(),
            };
            parse_project(stored, &owner)
        }
        .await;

        let project = self.settle(&CREATE_PROJECT, result).await?;
        self.publish(
            EntityType::Project,
            CrudAction::Created,
            project.id,
            Some(&project),
            actor.map(|a| a.id),
        );
        Ok(project)
    }

    pub async fn update_project(
        &self,
        id: Uuid,
        input: &UpdateProjectInput,
        actor: Option<&AuthUser>,
    ) -> QueryResult<Project> {
        let result: QueryResult<Project> = async {
            let input = check_input(input)?;
            let patch = serde_json::to_value(&input)?;
            let stored = self.store.update(Collection::Projects, id, patch).await?;
            parse_project(stored, &OwnerPlaceholder::Unresolved)
        }
        .await;

        let project = self.settle(&UPDATE_PROJECT, result).await?;
        self.publish(
            EntityType::Project,
            CrudAction::Updated,
            project.id,
            Some(&project),
            actor.map(|a| a.id),
        );
        Ok(project)
    }

    pub async fn delete_project(&self, id: Uuid, actor: Option<&AuthUser>) -> QueryResult<Uuid> {
        let result = self
            .store
            .delete(Collection::Projects, id)
            .await
            .map(|_| id)
            .map_err(QueryError::from);
        let id = self.settle(&DELETE_PROJECT, result).await?;
        self.publish::<Project>(
            EntityType::Project,
            CrudAction::Deleted,
            id,
            None,
            actor.map(|a| a.id),
        );
        Ok(id)
    }

    pub async fn project_stats(&self) -> QueryResult<ProjectStats> {
        Ok(ProjectStats::from_projects(&self.list_projects().await?))
    }
}
