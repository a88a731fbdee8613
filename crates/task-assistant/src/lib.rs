//! # task-assistant
//!
//! Task management domain for the assistant agent: the task model, the
//! store it lives in, and the tools the agent uses to create, find and
//! update tasks.
//!
//! ```text
//! ┌──────────────┐   ToolCall   ┌──────────────┐   NewTask/Filter/Patch  ┌─────────────┐
//! │ Agent (loop) │─────────────▶│ TaskToolkit  │────────────────────────▶│  TaskStore  │
//! │              │◀─────────────│  (TaskTool)  │◀────────────────────────│memory/sqlite│
//! └──────────────┘  ToolResult  └──────────────┘        Task / id        └─────────────┘
//! ```

pub mod error;
pub mod model;
pub mod store;
pub mod svckit;

pub use error::{Result, StoreError};
pub use model::{
    NewTask, Priority, Task, TaskFilter, TaskId, TaskPatch, TaskStatus, TaskType, UpdateOutcome,
};
pub use store::{MemoryTaskStore, TaskStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteTaskStore;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        CreateTaskTool, QueryTasksTool, TaskTool, TaskToolkit, UpdateTaskTool,
    };
}

/// System prompt for the task assistant agent
pub const TASK_ASSISTANT_PROMPT: &str = r"You are a task management assistant that helps the user plan and track study, coding and revision work.

## Tools Available

- `create_task` - Add a new task. Derive a short title from the request and put labels such as exam names in `tags`.
- `query_tasks` - Find tasks by tags, status or text in the title or topic.
- `update_task` - Change the status or priority of a task, or add tags. It needs the task id; call `query_tasks` first if you do not have it.

## Guidelines

1. Only create a task when the user asks to add, plan or remember something.
2. When the user refers to an existing task by name, look it up before updating it.
3. Statuses are pending, in_progress and done. Priorities are low, medium and high.
4. After using a tool, answer in plain language and mention what changed. Do not print raw JSON unless asked.
5. If a tool reports an error, explain it briefly and suggest what the user can do.";
