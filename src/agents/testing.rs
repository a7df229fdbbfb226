//! Scripted models and tools for exercising the agent loop without a
//! network.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::{ModelError, ToolError};
use crate::tools::CallableTool;

use super::model::{ChatMessage, ChatModel, ChatOutcome, TokenUsage, ToolCall};

/// A model that replays a fixed sequence of outcomes.
pub struct ScriptedModel {
    script: Mutex<VecDeque<ChatOutcome>>,
    calls: Mutex<usize>,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ChatOutcome>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            calls: Mutex::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers each call with the next plain-text reply.
    pub fn answering(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|reply| Self::text_turn(reply)).collect())
    }

    pub fn text_turn(text: &str) -> ChatOutcome {
        Self::text_turn_with_usage(text, 0, 0)
    }

    pub fn text_turn_with_usage(text: &str, prompt: u64, completion: u64) -> ChatOutcome {
        ChatOutcome {
            message: ChatMessage::assistant(text),
            usage: usage(prompt, completion),
        }
    }

    pub fn tool_turn(calls: &[(&str, &str, Value)]) -> ChatOutcome {
        Self::tool_turn_with_usage(calls, 0, 0)
    }

    pub fn tool_turn_with_usage(
        calls: &[(&str, &str, Value)],
        prompt: u64,
        completion: u64,
    ) -> ChatOutcome {
        ChatOutcome {
            message: ChatMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: calls
                    .iter()
                    .map(|(id, name, arguments)| ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments: arguments.clone(),
                    })
                    .collect(),
                tool_call_id: None,
            },
            usage: usage(prompt, completion),
        }
    }

    /// Number of completions served so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    /// The conversation passed to the most recent completion.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().clone()
    }
}

fn usage(prompt: u64, completion: u64) -> TokenUsage {
    TokenUsage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[super::model::ToolDeclaration],
    ) -> Result<ChatOutcome, ModelError> {
        *self.calls.lock() += 1;
        *self.last_messages.lock() = messages.to_vec();
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| ModelError::Malformed("scripted model ran out of turns".to_string()))
    }
}

/// A tool that records its arguments and echoes them back.
pub struct EchoTool {
    name: String,
    seen: Mutex<Vec<Value>>,
}

impl EchoTool {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Value> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl CallableTool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "echoes its arguments"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        self.seen.lock().push(args.clone());
        Ok(args)
    }
}

/// A tool that always fails with an execution error.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl CallableTool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        Err(ToolError::Execution {
            tool: self.name.clone(),
            message: "simulated failure".to_string(),
        })
    }
}
