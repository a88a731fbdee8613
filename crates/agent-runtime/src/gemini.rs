//! Gemini LLM Provider
//!
//! Implementation of `LlmProvider` for Google's Gemini `generateContent` API
//! with native function calling.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ProviderInfo, TokenUsage,
        DEFAULT_MODEL,
    },
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key, sent in the `x-goog-api-key` header
    pub api_key: String,

    /// Model id, e.g. `gemini-2.0-flash`
    pub model: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout. `None` means no ceiling.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: None,
        }
    }

    /// Read `GOOGLE_API_KEY`, `GEMINI_MODEL`, `GEMINI_BASE_URL` and
    /// `GEMINI_TIMEOUT_SECS`. A missing key is a configuration error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GOOGLE_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("GOOGLE_API_KEY is not set".into()))?;

        let timeout = match lookup("GEMINI_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|_| {
                AgentError::Config(format!("GEMINI_TIMEOUT_SECS must be a whole number, got '{raw}'"))
            })?)),
            None => None,
        };

        Ok(Self {
            api_key,
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            timeout,
        })
    }
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create from configuration
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{model}", self.config.base_url.trim_end_matches('/'))
    }

    /// Split history into the system instruction and Gemini `contents`.
    ///
    /// Consecutive tool messages are merged into one turn, since Gemini
    /// expects all function responses for a turn together.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let mut previous_was_tool = false;

        for message in messages {
            match message.role {
                Role::System => {
                    system_parts.push(message.content.clone());
                    continue;
                }
                Role::User => {
                    contents.push(json!({
                        "role": "user",
                        "parts": [{ "text": message.content }],
                    }));
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(json!({ "text": message.content }));
                    }
                    for call in &message.tool_calls {
                        parts.push(json!({
                            "functionCall": { "name": call.name, "args": call.arguments }
                        }));
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                }
                Role::Tool => {
                    let part = json!({
                        "functionResponse": {
                            "name": message.name.clone().unwrap_or_default(),
                            "response": { "result": message.content },
                        }
                    });

                    let merged = previous_was_tool
                        && contents
                            .last_mut()
                            .and_then(|c| c["parts"].as_array_mut())
                            .map(|parts| parts.push(part.clone()))
                            .is_some();
                    if !merged {
                        contents.push(json!({ "role": "user", "parts": [part] }));
                    }
                }
            }
            previous_was_tool = message.role == Role::Tool;
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, contents)
    }

    fn function_declaration(schema: &ToolSchema) -> Value {
        let mut parameters = schema.parameters_json_schema();
        if parameters["required"].as_array().is_some_and(Vec::is_empty) {
            if let Some(object) = parameters.as_object_mut() {
                object.remove("required");
            }
        }

        json!({
            "name": schema.name,
            "description": schema.description,
            "parameters": parameters,
        })
    }

    fn build_payload(messages: &[Message], tools: &[ToolSchema], options: &GenerationOptions) -> Value {
        let (system_instruction, contents) = Self::convert_messages(messages);

        let mut generation = json!({ "temperature": options.temperature });
        if let Some(max_tokens) = options.max_tokens {
            generation["maxOutputTokens"] = json!(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            generation["topP"] = json!(top_p);
        }
        if !options.stop_sequences.is_empty() {
            generation["stopSequences"] = json!(options.stop_sequences);
        }

        let mut payload = json!({
            "contents": contents,
            "generationConfig": generation,
        });

        if let Some(system_text) = system_instruction {
            payload["system_instruction"] = json!({ "parts": [{ "text": system_text }] });
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools.iter().map(Self::function_declaration).collect();
            payload["tools"] = json!([{ "function_declarations": declarations }]);
        }

        payload
    }

    /// Convert a Gemini response to an agent completion
    fn convert_completion(response: GenerateResponse, model: &str) -> Result<Completion> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".into());
            AgentError::Provider(format!("Gemini returned no answer: {reason}"))
        })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::from_json(call.name, call.args));
            }
        }

        let finish_reason = if tool_calls.is_empty() {
            candidate.finish_reason.as_deref().map(|r| match r {
                "STOP" => FinishReason::Stop,
                "MAX_TOKENS" => FinishReason::Length,
                "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                    FinishReason::ContentFilter
                }
                _ => FinishReason::Error,
            })
        } else {
            Some(FinishReason::ToolUse)
        };

        Ok(Completion {
            content: text,
            tool_calls,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
            usage: response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            finish_reason,
        })
    }

    fn status_error(status: StatusCode, body: &str) -> AgentError {
        let detail = format!("Gemini request failed with status {status}: {body}");
        match status {
            StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
            s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
            _ => AgentError::Provider(detail),
        }
    }

    fn transport_error(err: reqwest::Error) -> AgentError {
        let err = err.without_url();
        if err.is_timeout() || err.is_connect() || err.is_request() {
            AgentError::ProviderUnavailable(err.to_string())
        } else {
            AgentError::Provider(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "Gemini".into(),
            model: self.config.model.clone(),
            supports_tools: true,
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.model_url(&self.config.model))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "Gemini health check failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e.without_url());
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let payload = Self::build_payload(messages, tools, options);
        let url = format!("{}:generateContent", self.model_url(&options.model));

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to read body>"));
            return Err(Self::status_error(status, &body));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                AgentError::Parse(format!("failed to parse Gemini response: {}", e.without_url()))
            })?;

        Self::convert_completion(body, &options.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::ParameterSchema;

    fn schema() -> ToolSchema {
        ToolSchema {
            name: "query_tasks".into(),
            description: "Search tasks".into(),
            parameters: vec![ParameterSchema::string_list("tags", "Tags")],
        }
    }

    #[test]
    fn test_config_from_lookup() {
        let missing = GeminiConfig::from_lookup(|_| None);
        assert!(matches!(missing, Err(AgentError::Config(_))));

        let config = GeminiConfig::from_lookup(|k| match k {
            "GOOGLE_API_KEY" => Some("secret".into()),
            "GEMINI_TIMEOUT_SECS" => Some("30".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(!format!("{config:?}").contains("secret"));

        let bad_timeout = GeminiConfig::from_lookup(|k| match k {
            "GOOGLE_API_KEY" => Some("secret".into()),
            "GEMINI_TIMEOUT_SECS" => Some("soon".into()),
            _ => None,
        });
        assert!(bad_timeout.is_err());
    }

    #[test]
    fn test_payload_shape() {
        let call = ToolCall::from_json("query_tasks", json!({"tags": ["GATE"]})).with_id("call_1");
        let messages = vec![
            Message::system("be brief"),
            Message::user("Show my GATE tasks"),
            Message::assistant_with_calls("", vec![call.clone(), call.with_id("call_2")]),
            Message::tool("[]", "query_tasks", "call_1"),
            Message::tool("[]", "query_tasks", "call_2"),
        ];

        let payload = GeminiProvider::build_payload(&messages, &[schema()], &GenerationOptions::default());

        assert_eq!(payload["system_instruction"]["parts"][0]["text"], "be brief");
        let contents = payload["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "query_tasks");
        assert_eq!(contents[2]["parts"].as_array().unwrap().len(), 2);
        assert_eq!(contents[2]["parts"][0]["functionResponse"]["response"]["result"], "[]");

        let declaration = &payload["tools"][0]["function_declarations"][0];
        assert_eq!(declaration["name"], "query_tasks");
        assert!(declaration["parameters"].get("required").is_none());
        assert_eq!(payload["generationConfig"]["temperature"], json!(0.0));
        assert!(payload["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_parse_function_call_response() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "create_task", "args": { "title": "Revise Thermodynamics", "tags": ["GATE"] } } }]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15 }
        }))
        .unwrap();

        let completion = GeminiProvider::convert_completion(body, "gemini-2.0-flash").unwrap();
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "create_task");
        assert!(completion.tool_calls[0].id.starts_with("call_"));
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_text_and_empty_responses() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Done." }] }, "finishReason": "STOP" }]
        }))
        .unwrap();
        let completion = GeminiProvider::convert_completion(body, "m").unwrap();
        assert_eq!(completion.content, "Done.");
        assert!(completion.tool_calls.is_empty());

        let blocked: GenerateResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap();
        assert!(GeminiProvider::convert_completion(blocked, "m").is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert!(GeminiProvider::status_error(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(GeminiProvider::status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(matches!(
            GeminiProvider::status_error(StatusCode::FORBIDDEN, ""),
            AgentError::Auth(_)
        ));
        assert!(!GeminiProvider::status_error(StatusCode::BAD_REQUEST, "").is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_retryable() {
        let mut config = GeminiConfig::new("key");
        config.base_url = "http://127.0.0.1:9".into();
        config.timeout = Some(Duration::from_secs(2));
        let provider = GeminiProvider::from_config(config).unwrap();

        assert!(!provider.health_check().await.unwrap());

        let err = provider
            .complete(&[Message::user("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_carry_key() {
        let mut config = GeminiConfig::new("SUPERSECRETKEY");
        config.base_url = "http://127.0.0.1:9".into();
        config.timeout = Some(Duration::from_secs(2));
        let provider = GeminiProvider::from_config(config).unwrap();

        let err = provider
            .complete(&[Message::user("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap_err();

        let text = err.to_string();
        assert!(!text.contains("SUPERSECRETKEY"), "{text}");
        assert!(!text.contains("127.0.0.1"), "{text}");
        assert!(!err.user_message().contains("SUPERSECRETKEY"));
    }
}
