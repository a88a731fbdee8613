//! Service Kit - Agent Tools
//!
//! The three task tools and the `Toolset` that dispatches to them.

mod create_task;
mod query_tasks;
mod update_task;

pub use create_task::{CreateTaskArgs, CreateTaskTool};
pub use query_tasks::{QueryTasksArgs, QueryTasksTool};
pub use update_task::{UpdateTaskArgs, UpdateTaskTool};

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{AgentError, Result as CoreResult, ToolCall, ToolResult, ToolSchema, Toolset};

use crate::store::TaskStore;

/// A model-requested call, resolved to one of the known tools
#[derive(Clone, Debug)]
pub enum TaskTool {
    CreateTask(CreateTaskArgs),
    QueryTasks(QueryTasksArgs),
    UpdateTask(UpdateTaskArgs),
}

impl TaskTool {
    /// Resolve a call by name and decode its arguments.
    ///
    /// Unknown names fail with `AgentError::ToolNotFound`, bad arguments with
    /// `AgentError::ToolValidation`.
    pub fn parse(call: &ToolCall) -> CoreResult<Self> {
        let schema = Self::schema_for(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        schema.validate(call)?;

        match call.name.as_str() {
            create_task::NAME => Ok(Self::CreateTask(call.parse_arguments()?)),
            query_tasks::NAME => Ok(Self::QueryTasks(call.parse_arguments()?)),
            update_task::NAME => Ok(Self::UpdateTask(call.parse_arguments()?)),
            other => Err(AgentError::ToolNotFound(other.to_string())),
        }
    }

    pub fn schemas() -> Vec<ToolSchema> {
        vec![
            CreateTaskTool::schema(),
            QueryTasksTool::schema(),
            UpdateTaskTool::schema(),
        ]
    }

    fn schema_for(name: &str) -> Option<ToolSchema> {
        Self::schemas().into_iter().find(|s| s.name == name)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateTask(_) => create_task::NAME,
            Self::QueryTasks(_) => query_tasks::NAME,
            Self::UpdateTask(_) => update_task::NAME,
        }
    }
}

/// The task tools over one shared store
pub struct TaskToolkit {
    create: CreateTaskTool,
    query: QueryTasksTool,
    update: UpdateTaskTool,
}

impl TaskToolkit {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            create: CreateTaskTool::new(store.clone()),
            query: QueryTasksTool::new(store.clone()),
            update: UpdateTaskTool::new(store),
        }
    }
}

#[async_trait]
impl Toolset for TaskToolkit {
    fn schemas(&self) -> Vec<ToolSchema> {
        TaskTool::schemas()
    }

    async fn invoke(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let tool = TaskTool::parse(call)?;
        tracing::debug!(tool = tool.name(), call_id = %call.id, "dispatching tool call");

        match tool {
            TaskTool::CreateTask(args) => self.create.execute(args).await,
            TaskTool::QueryTasks(args) => self.query.execute(args).await,
            TaskTool::UpdateTask(args) => self.update.execute(args).await,
        }
    }
}
