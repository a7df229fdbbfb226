//! The agent turn loop.
//!
//! One `generate_text` run is a bounded conversation: the model is called
//! with the tool declarations, every requested tool call is dispatched
//! sequentially in request order, results are appended as tool messages,
//! and the loop repeats until the model answers with plain text. Tool
//! failures abort the run; there are no retries or per-call timeouts.

use std::sync::Arc;

use serde_json::Value;

use crate::error::SessionError;
use crate::tools::CallableTool;

use super::model::{ChatMessage, ChatModel, TokenUsage, ToolDeclaration};

/// Upper bound on model turns in one run. A model still requesting tools
/// past this point is looping.
pub const MAX_TURNS: usize = 12;

/// Result of one completed run.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    /// The model's final plain-text answer.
    pub text: String,
    /// Token usage summed over every turn.
    pub usage: TokenUsage,
}

/// Drive the model until it produces a final text answer.
pub async fn generate_text(
    model: &dyn ChatModel,
    system: &str,
    prompt: &str,
    tools: &[Arc<dyn CallableTool>],
    max_turns: usize,
) -> Result<GenerateOutput, SessionError> {
    let declarations: Vec<ToolDeclaration> = tools
        .iter()
        .map(|tool| ToolDeclaration {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        })
        .collect();

    let mut messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
    let mut usage = TokenUsage::default();

    for _ in 0..max_turns {
        let outcome = model.complete(&messages, &declarations).await?;
        usage.add(outcome.usage);

        let requested = outcome.message.tool_calls.clone();
        if requested.is_empty() {
            return Ok(GenerateOutput {
                text: outcome.message.content.unwrap_or_default(),
                usage,
            });
        }
        messages.push(outcome.message);

        for call in requested {
            let tool = tools
                .iter()
                .find(|tool| tool.name() == call.name)
                .ok_or_else(|| {
                    SessionError::Orchestration(format!(
                        "model requested unknown tool '{}'",
                        call.name
                    ))
                })?;
            log::debug!("dispatching tool '{}' ({})", call.name, call.id);
            let result = tool.call(call.arguments).await?;
            messages.push(ChatMessage::tool(call.id, render_tool_result(&result)));
        }
    }

    Err(SessionError::Orchestration(format!(
        "model did not produce a final answer within {max_turns} turns"
    )))
}

/// Tool results are fed back as message text; bare strings go through
/// unquoted so the model does not see JSON escaping.
fn render_tool_result(result: &Value) -> String {
    match result.as_str() {
        Some(text) => text.to_string(),
        None => result.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{EchoTool, FailingTool, ScriptedModel};
    use crate::error::ToolError;
    use serde_json::json;

    #[tokio::test]
    async fn test_plain_answer_returns_immediately() {
        let model = ScriptedModel::answering(&["all done"]);
        let out = generate_text(&model, "sys", "go", &[], MAX_TURNS).await.unwrap();
        assert_eq!(out.text, "all done");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_calls_dispatch_in_request_order() {
        let echo: Arc<EchoTool> = Arc::new(EchoTool::named("echo"));
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_turn(&[
                ("call_a", "echo", json!({"n": 1})),
                ("call_b", "echo", json!({"n": 2})),
            ]),
            ScriptedModel::text_turn("finished"),
        ]);

        let tools: Vec<Arc<dyn CallableTool>> = vec![echo.clone()];
        let out = generate_text(&model, "sys", "go", &tools, MAX_TURNS).await.unwrap();
        assert_eq!(out.text, "finished");
        assert_eq!(echo.seen(), vec![json!({"n": 1}), json!({"n": 2})]);

        // the second request carried both tool results back
        let replay = model.last_messages();
        let tool_messages: Vec<_> = replay.iter().filter(|m| m.role == "tool").collect();
        assert_eq!(tool_messages.len(), 2);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_b"));
    }

    #[tokio::test]
    async fn test_tool_failure_aborts_the_run() {
        let tools: Vec<Arc<dyn CallableTool>> = vec![Arc::new(FailingTool::named("broken"))];
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_turn(&[("call_1", "broken", json!({}))]),
            ScriptedModel::text_turn("unreachable"),
        ]);

        let err = generate_text(&model, "sys", "go", &tools, MAX_TURNS).await.unwrap_err();
        assert!(matches!(err, SessionError::Tool(ToolError::Execution { .. })));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_requested_tool_is_an_error() {
        let model = ScriptedModel::new(vec![ScriptedModel::tool_turn(&[(
            "call_1",
            "ghost",
            json!({}),
        )])]);
        let err = generate_text(&model, "sys", "go", &[], MAX_TURNS).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_turn_limit_stops_a_looping_model() {
        let echo: Arc<EchoTool> = Arc::new(EchoTool::named("echo"));
        let turns: Vec<_> = (0..5)
            .map(|i| {
                let call_id = format!("call_{i}");
                ScriptedModel::tool_turn(&[(call_id.as_str(), "echo", json!({}))])
            })
            .collect();
        let model = ScriptedModel::new(turns);
        let tools: Vec<Arc<dyn CallableTool>> = vec![echo];

        let err = generate_text(&model, "sys", "go", &tools, 3).await.unwrap_err();
        assert!(err.to_string().contains("3 turns"));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_usage_accumulates_across_turns() {
        let echo: Arc<EchoTool> = Arc::new(EchoTool::named("echo"));
        let model = ScriptedModel::new(vec![
            ScriptedModel::tool_turn_with_usage(&[("c1", "echo", json!({}))], 10, 5),
            ScriptedModel::text_turn_with_usage("done", 20, 8),
        ]);
        let tools: Vec<Arc<dyn CallableTool>> = vec![echo];

        let out = generate_text(&model, "sys", "go", &tools, MAX_TURNS).await.unwrap();
        assert_eq!(out.usage.prompt_tokens, 30);
        assert_eq!(out.usage.completion_tokens, 13);
        assert_eq!(out.usage.total_tokens, 43);
    }
}
