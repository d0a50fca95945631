//! Task hooks.

use super::{check_input, keep_row, parse_row, Outcome, QueryClient, QueryError, QueryResult};
use crate::cache::{QueryKey, QueryScope};
use crate::events::{CrudAction, EntityType};
use crate::remote::{AuthUser, Collection, SelectQuery};
use crate::schema::{CreateTaskInput, Task, TaskStatus, UpdateTaskInput};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const CREATE_TASK: Outcome = Outcome {
    action: "create task",
    invalidates: &[QueryScope::Tasks],
    success: Some(("Success", "Task created successfully")),
    failure: Some(("Error", "Failed to create task")),
};

const UPDATE_TASK: Outcome = Outcome {
    action: "update task",
    invalidates: &[QueryScope::Tasks],
    success: Some(("Success", "Task updated successfully")),
    failure: Some(("Error", "Failed to update task")),
};

const DELETE_TASK: Outcome = Outcome {
    action: "delete task",
    invalidates: &[QueryScope::Tasks],
    success: Some(("Success", "Task deleted successfully")),
    failure: Some(("Error", "Failed to delete task")),
};

/// Task counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub todo: usize,
    pub progress: usize,
    pub review: usize,
    pub done: usize,
    pub total: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::Progress => stats.progress += 1,
                TaskStatus::Review => stats.review += 1,
                TaskStatus::Done => stats.done += 1,
            }
        }
        stats
    }
}

impl QueryClient {
    /// All tasks, newest first
    pub async fn list_tasks(&self) -> QueryResult<Vec<Task>> {
        self.fetch_list(
            QueryKey::all(QueryScope::Tasks),
            Collection::Tasks,
            SelectQuery::newest_first(),
            keep_row,
        )
        .await
    }

    /// Create a task. The acting user, when known, is recorded as `created_by`.
    pub async fn create_task(&self, input: &CreateTaskInput, actor: Option<&AuthUser>) -> QueryResult<Task> {
        let result: QueryResult<Task> = async {
            let input = check_input(input)?;
            let mut row = serde_json::to_value(&input)?;
            if let (Some(actor), Value::Object(map)) = (actor, &mut row) {
                map.insert("created_by".into(), Value::String(actor.id.to_string()));
            }
            let stored = self.store.insert(Collection::Tasks, row).await?;
            parse_row::<Task>(&stored)
        }
        .await;

        let task = self.settle(&CREATE_TASK, result).await?;
        self.publish(
            EntityType::Task,
            CrudAction::Created,
            task.id,
            Some(&task),
            actor.map(|a| a.id),
        );
        Ok(task)
    }

    /// Update the supplied fields of a task
    pub async fn update_task(
        &self,
        id: Uuid,
        input: &UpdateTaskInput,
        actor: Option<&AuthUser>,
    ) -> QueryResult<Task> {
        let result: QueryResult<Task> = async {
            let input = check_input(input)?;
            let patch = serde_json::to_value(&input)?;
            let stored = self.store.update(Collection::Tasks, id, patch).await?;
            parse_row::<Task>(&stored)
        }
        .await;

        let task = self.settle(&UPDATE_TASK, result).await?;
        self.publish(
            EntityType::Task,
            CrudAction::Updated,
            task.id,
            Some(&task),
            actor.map(|a| a.id),
        );
        Ok(task)
    }

    pub async fn delete_task(&self, id: Uuid, actor: Option<&AuthUser>) -> QueryResult<Uuid> {
        let result = self
            .store
            .delete(Collection::Tasks, id)
            .await
            .map(|_| id)
            .map_err(QueryError::from);
        let id = self.settle(&DELETE_TASK, result).await?;
        self.publish::<Task>(
            EntityType::Task,
            CrudAction::Deleted,
            id,
            None,
            actor.map(|a| a.id),
        );
        Ok(id)
    }

    pub async fn task_stats(&self) -> QueryResult<TaskStats> {
        Ok(TaskStats::from_tasks(&self.list_tasks().await?))
    }
}
