//! Create Task Tool

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use agent_core::{
    AgentError, ParameterSchema, Result as CoreResult, ToolResult, ToolSchema,
};

use crate::model::{NewTask, Priority, TaskType, deserialize_tags};
use crate::store::TaskStore;

pub const NAME: &str = "create_task";

#[derive(Clone, Debug, Deserialize)]
pub struct CreateTaskArgs {
    pub title: String,

    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, rename = "type")]
    pub task_type: TaskType,

    #[serde(default)]
    pub raw_input: Option<String>,
}

impl CreateTaskArgs {
    fn into_new_task(self) -> CoreResult<NewTask> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AgentError::ToolValidation(format!("{NAME}: title must not be empty")));
        }

        Ok(NewTask {
            title: title.to_string(),
            raw_input: self.raw_input,
            subject: self.subject,
            topic: self.topic,
            tags: self.tags,
            task_type: self.task_type,
            priority: self.priority,
        })
    }
}

/// Tool that records a new task
pub struct CreateTaskTool {
    store: Arc<dyn TaskStore>,
}

impl CreateTaskTool {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn schema() -> ToolSchema {
        ToolSchema {
            name: NAME.into(),
            description: "Create a new task. Use when the user wants to add, plan or remember \
                          something to study, code or revise."
                .into(),
            parameters: vec![
                ParameterSchema::new("title", "string", "Short title of the task").required(),
                ParameterSchema::new("subject", "string", "Subject area, e.g. 'Physics'"),
                ParameterSchema::new("topic", "string", "Specific topic, e.g. 'Thermodynamics'"),
                ParameterSchema::string_list("tags", "Labels such as exam names or courses")
                    .default_value(json!([])),
                ParameterSchema::new("priority", "string", "Task priority")
                    .one_of(Priority::ALL)
                    .default_value(json!("medium")),
                ParameterSchema::new("type", "string", "Kind of task")
                    .one_of(TaskType::ALL)
                    .default_value(json!("study")),
                ParameterSchema::new("raw_input", "string", "The user's original wording"),
            ],
        }
    }

    pub async fn execute(&self, args: CreateTaskArgs) -> CoreResult<ToolResult> {
        let task = args.into_new_task()?;
        let id = self.store.create(task).await?;

        tracing::info!(task_id = %id, "task created");
        Ok(ToolResult::success(
            NAME,
            format!("Task created successfully. ID: {id}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskFilter, TaskStatus};
    use crate::store::MemoryTaskStore;
    use agent_core::ToolCall;

    fn args(value: serde_json::Value) -> CreateTaskArgs {
        ToolCall::from_json(NAME, value).parse_arguments().unwrap()
    }

    #[tokio::test]
    async fn test_create_with_defaults() {
        let store = Arc::new(MemoryTaskStore::new());
        let tool = CreateTaskTool::new(store.clone());

        let result = tool
            .execute(args(json!({"title": "Revise Thermodynamics", "tags": ["GATE"]})))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Task created successfully. ID: "));

        let tasks = store.find(&TaskFilter::default(), 5).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Revise Thermodynamics");
        assert_eq!(tasks[0].tags, vec!["GATE"]);
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert_eq!(tasks[0].task_type, TaskType::Study);
        assert!(result.output.ends_with(&tasks[0].id.to_string()));
    }

    #[test]
    fn test_args_accept_loose_model_output() {
        let parsed = args(json!({
            "title": "Build lexer",
            "tags": "rust, compilers,rust",
            "priority": "HIGH",
            "type": "Code",
            "subject": null
        }));

        assert_eq!(parsed.tags, vec!["rust", "compilers"]);
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.task_type, TaskType::Code);
        assert!(parsed.subject.is_none());
    }

    #[test]
    fn test_bad_enum_is_validation_error() {
        let err = ToolCall::from_json(NAME, json!({"title": "x", "priority": "urgent"}))
            .parse_arguments::<CreateTaskArgs>()
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let store = Arc::new(MemoryTaskStore::new());
        let tool = CreateTaskTool::new(store.clone());

        let err = tool.execute(args(json!({"title": "   "}))).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(store.is_empty().await);
    }
}
