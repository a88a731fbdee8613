//! Completion Service Binding
//!
//! Couples a provider with the toolset's schemas, deterministic generation
//! options and a retry policy. One call produces exactly one assistant message.

use std::sync::Arc;

use crate::error::Result;
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::retry::RetryPolicy;
use crate::tool::ToolSchema;

pub struct CompletionBinding {
    provider: Arc<dyn LlmProvider>,
    tools: Vec<ToolSchema>,
    options: GenerationOptions,
    retry: RetryPolicy,
}

impl CompletionBinding {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Vec<ToolSchema>,
        options: GenerationOptions,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            tools,
            options,
            retry,
        }
    }

    /// Ask the model for its next turn given the full history
    pub async fn complete(&self, conversation: &Conversation) -> Result<Message> {
        let provider = self.provider.as_ref();
        let messages = conversation.messages();
        let tools = self.tools.as_slice();
        let options = &self.options;

        let completion = self
            .retry
            .run("completion", move || provider.complete(messages, tools, options))
            .await?;

        tracing::debug!(
            model = %completion.model,
            tool_calls = completion.tool_calls.len(),
            finish_reason = ?completion.finish_reason,
            "completion received"
        );

        Ok(completion.into_message())
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }
}
