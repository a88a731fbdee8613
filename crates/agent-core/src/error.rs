//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding (retryable)
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Completion service still failing after the retry budget was spent
    #[error("Model unavailable after {attempts} attempt(s): {reason}")]
    ModelUnavailable { attempts: usize, reason: String },

    /// Backing task store is unreachable or returned garbage
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Tool not found in the toolset
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Reason/Act round-trip budget exhausted
    #[error("Loop budget exceeded: no final answer after {0} round trip(s)")]
    LoopBudgetExceeded(usize),

    /// Parse error (e.g., malformed provider payload)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_) | Self::Io(_)
        )
    }

    /// Errors that belong to a single tool call. The loop reports these back
    /// to the model as a tool result and keeps going.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_) | Self::ToolValidation(_) | Self::ToolExecution(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) | Self::ModelUnavailable { .. } => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::StoreUnavailable(_) => "The task store is currently unavailable.".into(),
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::LoopBudgetExceeded(n) => format!(
                "Loop budget exceeded: the assistant did not reach an answer within {n} steps."
            ),
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication with the AI service failed.".into(),
            Self::Config(msg) => format!("Configuration error: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(AgentError::RateLimited("slow down".into()).is_retryable());
        assert!(!AgentError::Auth("bad key".into()).is_retryable());

        assert!(AgentError::ToolNotFound("delete_everything".into()).is_recoverable());
        assert!(!AgentError::StoreUnavailable("down".into()).is_recoverable());
        assert!(!AgentError::LoopBudgetExceeded(3).is_recoverable());
    }

    #[test]
    fn test_budget_message_is_distinct() {
        let msg = AgentError::LoopBudgetExceeded(4).user_message();
        assert!(msg.starts_with("Loop budget exceeded"));
        assert_ne!(msg, AgentError::Other("x".into()).user_message());
    }
}
