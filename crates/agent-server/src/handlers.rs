//! HTTP Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_connected: bool,
    pub store_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Agentic Task Assistant API is running",
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_connected = state.agent.provider().health_check().await.unwrap_or(false);
    let store_connected = state.store.health_check().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_connected,
        store_connected,
    })
}

/// Run the agent on one message
pub async fn agent_handler(
    State(state): State<AppState>,
    Json(payload): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, (StatusCode, Json<ErrorResponse>)> {
    let run = state.agent.ask_detailed(&payload.message).await.map_err(|e| {
        tracing::error!("Agent error: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                detail: e.user_message(),
            }),
        )
    })?;

    tracing::info!(
        round_trips = run.round_trips,
        tool_calls = run.tool_calls,
        "agent request completed"
    );

    Ok(Json(AgentResponse { response: run.reply }))
}
