//! Built-in tools selected by manifest id.
//!
//! A `builtin` manifest carries no endpoint; its id picks one of the fixed
//! behaviors here. Unknown ids are a configuration error surfaced at load
//! time, not at call time, so a broken session fails fast during
//! `loading_tools`.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::blackboard::{Blackboard, ARTIFACTS_NAMESPACE};
use crate::error::ToolError;

/// The fixed set of built-in behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    /// `execute_code`: sandboxed code execution (mocked transport).
    CodeRunner,
    /// `generate_document`: writes a document artifact to the blackboard.
    DocumentGenerator,
}

/// Session context handed to built-in executions.
#[derive(Clone)]
pub struct BuiltinContext {
    pub session_id: String,
    pub blackboard: Blackboard,
}

impl BuiltinTool {
    /// Resolve a manifest id to a built-in behavior.
    pub fn from_id(id: &str) -> Result<Self, ToolError> {
        match id {
            // execute_typescript is the legacy id for the code runner;
            // manifests registered before the rename still carry it.
            "execute_code" | "execute_typescript" => Ok(BuiltinTool::CodeRunner),
            "generate_document" => Ok(BuiltinTool::DocumentGenerator),
            other => Err(ToolError::Configuration(format!(
                "unknown builtin tool '{other}'"
            ))),
        }
    }

    /// Canonical parameter schema, used when the manifest declares none.
    pub fn default_parameters(&self) -> Value {
        match self {
            BuiltinTool::CodeRunner => json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "Source code to execute" },
                    "dependencies": { "type": "array", "description": "Package names to install first" }
                },
                "required": ["code"]
            }),
            BuiltinTool::DocumentGenerator => json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string", "description": "Document title" },
                    "content": { "type": "string", "description": "Full document body" },
                    "format": { "type": "string", "description": "Output format, defaults to markdown" }
                },
                "required": ["title", "content"]
            }),
        }
    }

    pub async fn execute(
        &self,
        ctx: &BuiltinContext,
        agent_id: Option<&str>,
        args: &Value,
    ) -> Result<Value, ToolError> {
        match self {
            BuiltinTool::CodeRunner => run_code(args),
            BuiltinTool::DocumentGenerator => generate_document(ctx, agent_id, args).await,
        }
    }
}

// No sandbox transport is wired up yet; report the submission back so the
// model can proceed. TODO: route through the runner service once its HTTP
// surface stabilizes.
fn run_code(args: &Value) -> Result<Value, ToolError> {
    let code = args
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("missing required argument 'code'".into()))?;
    let dependencies = args
        .get("dependencies")
        .cloned()
        .unwrap_or_else(|| json!([]));

    log::info!("execute_code: {} bytes submitted", code.len());
    Ok(json!({
        "stdout": format!("Executed {} bytes of code", code.len()),
        "exitCode": 0,
        "dependencies": dependencies,
    }))
}

async fn generate_document(
    ctx: &BuiltinContext,
    agent_id: Option<&str>,
    args: &Value,
) -> Result<Value, ToolError> {
    let title = args
        .get("title")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("missing required argument 'title'".into()))?;
    let content = args
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments("missing required argument 'content'".into()))?;
    let format = args
        .get("format")
        .and_then(Value::as_str)
        .unwrap_or("markdown");

    let document_id = format!("doc-{}", Uuid::new_v4());
    ctx.blackboard
        .write(
            &ctx.session_id,
            ARTIFACTS_NAMESPACE,
            &document_id,
            json!({
                "type": "document",
                "title": title,
                "content": content,
                "metadata": { "format": format },
            }),
            agent_id,
            None,
        )
        .await?;

    log::info!("generate_document: wrote artifact {document_id} ('{title}')");
    Ok(json!({ "documentId": document_id, "status": "created" }))
}
