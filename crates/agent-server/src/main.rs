//! Agentic Task Assistant HTTP Server
//!
//! Axum server exposing the task assistant agent over a small JSON API.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentBuilder, LlmProvider, Toolset};
use agent_runtime::GeminiProvider;
use task_assistant::{
    MemoryTaskStore, SqliteTaskStore, TASK_ASSISTANT_PROMPT, TaskStore, tools::TaskToolkit,
};

use crate::config::{ServerConfig, StoreBackend};
use crate::handlers::{agent_handler, health_check, root};
use crate::state::AppState;

const SQLITE_POOL_SIZE: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().inspect_err(|e| {
        tracing::error!("{}", e);
    })?;

    // Task store
    let store: Arc<dyn TaskStore> = match &config.store {
        StoreBackend::Memory => Arc::new(MemoryTaskStore::new()),
        StoreBackend::Sqlite { url } => Arc::new(SqliteTaskStore::new(url, SQLITE_POOL_SIZE)?),
    };

    if store.health_check().await {
        tracing::info!("✓ Task store ready ({})", store.name());
    } else {
        tracing::warn!("⚠ Task store ({}) not reachable - tool calls will fail", store.name());
    }

    // Initialize LLM provider
    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::from_config(config.gemini.clone())?);
    let info = provider.info();
    tracing::info!("Completion service: {} ({})", info.name, info.model);

    // Tools
    let tools = Arc::new(TaskToolkit::new(store.clone()));
    tracing::info!("Registered tools: {}", tools.names().join(", "));

    let agent = AgentBuilder::new()
        .provider(provider)
        .tools(tools)
        .system_prompt(TASK_ASSISTANT_PROMPT)
        .model(config.gemini.model.clone())
        .max_round_trips(config.max_round_trips)
        .build()?;

    let state = AppState {
        agent: Arc::new(agent),
        store,
    };

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("Task assistant listening on http://{}", config.bind_addr);
    tracing::info!("  GET  /           - Liveness message");
    tracing::info!("  GET  /health     - Health check");
    tracing::info!("  POST /api/agent  - Send a message to the agent");

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/agent", post(agent_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::{Completion, GenerationOptions, ProviderInfo};
    use agent_core::{AgentError, Message, RetryPolicy, ToolCall, ToolSchema};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use task_assistant::TaskFilter;
    use tower::ServiceExt;

    enum Script {
        Replies(Mutex<VecDeque<Completion>>),
        AlwaysCallTools,
        Down,
    }

    struct ScriptedProvider(Script);

    impl ScriptedProvider {
        fn replies(replies: Vec<Completion>) -> Self {
            Self(Script::Replies(Mutex::new(replies.into())))
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "Scripted".into(),
                model: "scripted".into(),
                supports_tools: true,
            }
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(!matches!(self.0, Script::Down))
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            match &self.0 {
                Script::Replies(queue) => Ok(queue
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Completion::text("(script exhausted)", "scripted"))),
                Script::AlwaysCallTools => Ok(Completion::tool_use(
                    vec![ToolCall::from_json("query_tasks", json!({}))],
                    "scripted",
                )),
                Script::Down => Err(AgentError::ProviderUnavailable("connection refused".into())),
            }
        }
    }

    fn app_with(provider: ScriptedProvider, store: Arc<MemoryTaskStore>) -> Router {
        let tools = Arc::new(TaskToolkit::new(store.clone()));
        let agent = AgentBuilder::new()
            .provider(Arc::new(provider))
            .tools(tools)
            .system_prompt(TASK_ASSISTANT_PROMPT)
            .max_round_trips(2)
            .retry(RetryPolicy::none())
            .build()
            .unwrap();

        build_router(AppState {
            agent: Arc::new(agent),
            store,
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_agent(message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/agent")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "message": message }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let app = app_with(ScriptedProvider::replies(vec![]), Arc::new(MemoryTaskStore::new()));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Agentic Task Assistant API is running"}));
    }

    #[tokio::test]
    async fn test_agent_creates_task() {
        let store = Arc::new(MemoryTaskStore::new());
        let provider = ScriptedProvider::replies(vec![
            Completion::tool_use(
                vec![ToolCall::from_json(
                    "create_task",
                    json!({"title": "Revise Thermodynamics", "tags": ["GATE"]}),
                )],
                "scripted",
            ),
            Completion::text("Task created successfully.", "scripted"),
        ]);

        let (status, body) = send(
            app_with(provider, store.clone()),
            post_agent("Add a task to revise Thermodynamics with tag GATE"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "Task created successfully."}));

        let tasks = store.find(&TaskFilter::default(), 5).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Revise Thermodynamics");
        assert_eq!(tasks[0].tags, vec!["GATE"]);
    }

    #[tokio::test]
    async fn test_model_unavailable_is_500() {
        let app = app_with(ScriptedProvider(Script::Down), Arc::new(MemoryTaskStore::new()));

        let (status, body) = send(app, post_agent("hello")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_loop_budget_is_distinct_500() {
        let app = app_with(
            ScriptedProvider(Script::AlwaysCallTools),
            Arc::new(MemoryTaskStore::new()),
        );

        let (status, body) = send(app, post_agent("show everything forever")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("Loop budget exceeded"));
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let app = app_with(ScriptedProvider::replies(vec![]), Arc::new(MemoryTaskStore::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/api/agent")
            .header("content-type", "application/json")
            .body(Body::from("{"))
            .unwrap();

        let (status, _) = send(app, request).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_with(ScriptedProvider(Script::Down), Arc::new(MemoryTaskStore::new()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_connected"], false);
        assert_eq!(body["store_connected"], true);
    }
}
