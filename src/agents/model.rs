//! Chat model abstraction and the OpenAI-compatible backend client.
//!
//! Agents talk to language models through [`ChatModel`]; the production
//! implementation is [`BackendModel`], which posts to the gateway's
//! `/v1/chat/completions` endpoint. Tests swap in scripted models.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ModelError;

/// One requested tool invocation inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Already-decoded JSON arguments.
    pub arguments: Value,
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// A tool-role message answering one requested call.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Token counts for one completion, accumulated across executor turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Declaration of one callable tool, in the wire's function format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The assistant message plus usage for one completion.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub message: ChatMessage,
    pub usage: TokenUsage,
}

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, as sent on the wire.
    fn model_name(&self) -> &str;

    /// Run one completion over the conversation so far.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDeclaration],
    ) -> Result<ChatOutcome, ModelError>;

    /// Streaming completions are not wired up; callers find out at call
    /// time, matching the tool bus's lazy-failure policy.
    async fn complete_streaming(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDeclaration],
    ) -> Result<ChatOutcome, ModelError> {
        Err(ModelError::Unimplemented(
            "streaming completions".to_string(),
        ))
    }
}

/// Hands out [`ChatModel`] instances by model name.
pub trait ModelProvider: Send + Sync {
    fn model(&self, name: &str) -> Arc<dyn ChatModel>;
}

// ---------------------------------------------------------------------------
// Backend gateway client
// ---------------------------------------------------------------------------

/// OpenAI-compatible client against the backend gateway.
pub struct BackendModel {
    base_url: String,
    model: String,
    auth_token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    /// JSON object encoded as a string, per the wire format.
    arguments: String,
}

impl BackendModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            auth_token: auth_token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolDeclaration]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|tool| json!({ "type": "function", "function": tool }))
                    .collect(),
            );
        }
        body
    }
}

#[async_trait]
impl ChatModel for BackendModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDeclaration],
    ) -> Result<ChatOutcome, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(&self.request_body(messages, tools))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|err| ModelError::Malformed(format!("completion response: {err}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Malformed("completion had no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments).map_err(|err| {
                    ModelError::Malformed(format!(
                        "tool call '{}' arguments: {err}",
                        call.function.name
                    ))
                })?;
                Ok(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(ChatOutcome {
            message: ChatMessage {
                role: "assistant".to_string(),
                content: choice.message.content,
                tool_calls,
                tool_call_id: None,
            },
            usage: parsed.usage.unwrap_or_default(),
        })
    }
}

/// [`ModelProvider`] backed by the gateway.
pub struct BackendProvider {
    base_url: String,
    auth_token: String,
}

impl BackendProvider {
    pub fn new(base_url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: auth_token.into(),
        }
    }
}

impl ModelProvider for BackendProvider {
    fn model(&self, name: &str) -> Arc<dyn ChatModel> {
        Arc::new(BackendModel::new(
            self.base_url.clone(),
            name,
            self.auth_token.clone(),
        ))
    }
}
