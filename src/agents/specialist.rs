//! Specialist agents.
//!
//! A specialist is a named model-plus-instructions pair with its own tool
//! set. It runs one delegated task at a time; the orchestrator is its only
//! caller.

use std::sync::Arc;

use crate::error::SessionError;
use crate::tools::CallableTool;

use super::executor::{generate_text, GenerateOutput, MAX_TURNS};
use super::model::ChatModel;

pub struct Specialist {
    name: String,
    instructions: String,
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn CallableTool>>,
}

impl Specialist {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: Arc<dyn ChatModel>,
        tools: Vec<Arc<dyn CallableTool>>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model,
            tools,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute one delegated task to completion.
    pub async fn run(&self, task: &str) -> Result<GenerateOutput, SessionError> {
        log::info!("specialist '{}' starting task", self.name);
        let output = generate_text(
            self.model.as_ref(),
            &self.instructions,
            task,
            &self.tools,
            MAX_TURNS,
        )
        .await?;
        log::info!(
            "specialist '{}' finished ({} tokens)",
            self.name,
            output.usage.total_tokens
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{EchoTool, ScriptedModel};
    use serde_json::json;

    #[tokio::test]
    async fn test_specialist_runs_task_with_its_tools() {
        let echo = Arc::new(EchoTool::named("echo"));
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_turn(&[("c1", "echo", json!({"q": "facts"}))]),
            ScriptedModel::text_turn("here are the facts"),
        ]));
        let specialist = Specialist::new(
            "researcher",
            "You research things.",
            model,
            vec![echo.clone()],
        );

        let out = specialist.run("find facts").await.unwrap();
        assert_eq!(out.text, "here are the facts");
        assert_eq!(echo.seen().len(), 1);
    }
}
