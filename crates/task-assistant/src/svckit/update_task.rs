//! Update Task Tool

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use agent_core::{AgentError, ParameterSchema, Result as CoreResult, ToolResult, ToolSchema};

use crate::error::StoreError;
use crate::model::{Priority, TaskId, TaskPatch, TaskStatus, deserialize_tags};
use crate::store::TaskStore;

pub const NAME: &str = "update_task";

pub const INVALID_ID: &str = "Invalid Task ID format.";
pub const NO_CHANGES: &str = "Task not found or no changes made.";

/// Raw `update_task` arguments.
///
/// Only the id is decoded up front; the requested changes are decoded after
/// the id has been checked, so a malformed id always gets `INVALID_ID`.
#[derive(Clone, Debug, Deserialize)]
pub struct UpdateTaskArgs {
    #[serde(deserialize_with = "deserialize_task_id")]
    pub task_id: String,

    #[serde(flatten)]
    pub changes: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskChanges {
    #[serde(default)]
    status: Option<TaskStatus>,

    #[serde(default)]
    priority: Option<Priority>,

    #[serde(default, deserialize_with = "deserialize_tags")]
    add_tags: Vec<String>,
}

// Any JSON value is accepted here; non-ids are rejected by `TaskId::parse`.
fn deserialize_task_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => id,
        other => other.to_string(),
    })
}

/// Tool that changes status, priority or tags of an existing task
pub struct UpdateTaskTool {
    store: Arc<dyn TaskStore>,
}

impl UpdateTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn schema() -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Update an existing task by id: change its status or priority, or add \
                          tags. Look the id up with query_tasks first if you do not have it."
                .into(),
            parameters: vec![
                ParameterSchema::new("task_id", "string", "Id of the task to update").required(),
                ParameterSchema::new("status", "string", "New status").one_of(TaskStatus::ALL),
                ParameterSchema::new("priority", "string", "New priority").one_of(Priority::ALL),
                ParameterSchema::string_list("add_tags", "Tags to add to the task"),
            ],
        }
    }

    pub async fn execute(&self, args: UpdateTaskArgs) -> CoreResult<ToolResult> {
        if TaskId::parse(&args.task_id).is_err() {
            tracing::debug!(task_id = %args.task_id, "rejected malformed task id");
            return Ok(ToolResult::success(NAME, INVALID_ID));
        }

        let changes: TaskChanges = serde_json::from_value(Value::Object(args.changes))
            .map_err(|e| AgentError::ToolValidation(format!("{NAME}: {e}")))?;
        let patch = TaskPatch {
            status: changes.status,
            priority: changes.priority,
            add_tags: changes.add_tags,
        };

        let output = match self.store.update(&args.task_id, patch).await {
            Ok(outcome) if outcome.modified => format!("Task {} updated successfully.", args.task_id),
            Ok(_) => NO_CHANGES.to_string(),
            Err(StoreError::InvalidIdentifier(id)) => {
                tracing::debug!(task_id = %id, "rejected malformed task id");
                INVALID_ID.to_string()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(ToolResult::success(NAME, output))
    }
}
