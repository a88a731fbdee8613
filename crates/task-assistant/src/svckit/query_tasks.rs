//! Query Tasks Tool
//!
//! Returns matching tasks as a JSON array so the model can read ids back.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::json;

use agent_core::{ParameterSchema, Result as CoreResult, ToolResult, ToolSchema};

use crate::model::{TaskFilter, TaskStatus, deserialize_tags};
use crate::store::TaskStore;

pub const NAME: &str = "query_tasks";

/// Upper bound on a single query
pub const MAX_LIMIT: usize = 50;

#[derive(Clone, Debug, Deserialize)]
pub struct QueryTasksArgs {
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Free text matched against title or topic
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default = "default_limit", deserialize_with = "deserialize_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    TaskFilter::DEFAULT_LIMIT
}

// Models sometimes send 5.0 for an integer parameter.
fn deserialize_limit<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 1.0 {
        return Ok(1);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let limit = value as usize;
    Ok(limit.clamp(1, MAX_LIMIT))
}

impl QueryTasksArgs {
    fn into_filter(self) -> (TaskFilter, usize) {
        let text = self
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        let filter = TaskFilter {
            tags: self.tags,
            status: self.status,
            text,
        };
        (filter, self.limit.clamp(1, MAX_LIMIT))
    }
}

/// Tool that searches stored tasks
pub struct QueryTasksTool {
    store: Arc<dyn TaskStore>,
}

impl QueryTasksTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn schema() -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Search the user's tasks by tags, status or free text. Returns a JSON \
                          list of tasks including their ids."
                .into(),
            parameters: vec![
                ParameterSchema::string_list("tags", "Return tasks carrying any of these tags"),
                ParameterSchema::new("status", "string", "Only tasks in this status")
                    .one_of(TaskStatus::ALL),
                ParameterSchema::new("query", "string", "Text to look for in title or topic"),
                ParameterSchema::new("limit", "integer", "Maximum number of tasks to return")
                    .default_value(json!(TaskFilter::DEFAULT_LIMIT)),
            ],
        }
    }

    pub async fn execute(&self, args: QueryTasksArgs) -> CoreResult<ToolResult> {
        let (filter, limit) = args.into_filter();
        let tasks = self.store.find(&filter, limit).await?;

        tracing::debug!(matched = tasks.len(), limit, "tasks queried");

        let data = serde_json::to_value(&tasks)?;
        Ok(ToolResult::success(NAME, data.to_string()).with_data(data))
    }
}
