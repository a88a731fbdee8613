//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction and a fixed
//! Reason/Act tool loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Agent                              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────────────┐  │
//! │  │   Reason    │──▶│     Act     │   │ CompletionBinding  │  │
//! │  │             │◀──│  (Toolset)  │   │ LlmProvider+Retry  │  │
//! │  └─────────────┘   └─────────────┘   └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait lets the agent run against any completion service
//! with native tool calling; the `Toolset` trait is the only way tools are
//! reached.

pub mod binding;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod retry;
pub mod tool;

pub use binding::CompletionBinding;
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentRun};
pub use retry::RetryPolicy;
pub use tool::{ParameterSchema, ToolCall, ToolResult, ToolSchema, Toolset};
