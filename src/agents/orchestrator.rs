//! The orchestrator agent.
//!
//! The orchestrator receives the user request, plans, and coordinates by
//! calling tools: everything on the bus plus two synthesized tools of its
//! own, `delegate_task` (hand a task to a named specialist) and
//! `query_blackboard` (read the shared memory). Delegation is strictly
//! sequential; a specialist runs to completion before the orchestrator
//! sees the next model turn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::blackboard::Blackboard;
use crate::error::{SessionError, ToolError};
use crate::tasks::{TaskStatus, TaskStore};
use crate::tools::{CallableTool, ToolBus};

use super::executor::{generate_text, GenerateOutput, MAX_TURNS};
use super::model::{ChatModel, TokenUsage};
use super::specialist::Specialist;

pub struct Orchestrator {
    session_id: String,
    model: Arc<dyn ChatModel>,
    specialists: HashMap<String, Arc<Specialist>>,
    tasks: TaskStore,
    blackboard: Blackboard,
    bus: Arc<ToolBus>,
    extra_instructions: Option<String>,
}

impl Orchestrator {
    pub fn new(
        session_id: impl Into<String>,
        model: Arc<dyn ChatModel>,
        specialists: HashMap<String, Arc<Specialist>>,
        tasks: TaskStore,
        blackboard: Blackboard,
        bus: Arc<ToolBus>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            model,
            specialists,
            tasks,
            blackboard,
            bus,
            extra_instructions: None,
        }
    }

    /// Append operator-supplied instructions to the built-in prompt.
    pub fn with_extra_instructions(mut self, extra: Option<String>) -> Self {
        self.extra_instructions = extra;
        self
    }

    fn instructions(&self) -> String {
        let mut names: Vec<&str> = self.specialists.keys().map(String::as_str).collect();
        names.sort_unstable();
        let roster = names
            .iter()
            .map(|name| format!("- {name}"))
            .collect::<Vec<_>>()
            .join("\n");
        let mut instructions = format!(
            "You are the orchestrator of a multi-agent session. Break the \
             user's request into tasks and hand them to specialists with the \
             delegate_task tool. Use query_blackboard to read what \
             specialists have already recorded before delegating duplicate \
             work. When the work is done, reply with the final answer as \
             plain text.\n\nAvailable specialists:\n{roster}"
        );
        if let Some(extra) = &self.extra_instructions {
            instructions.push_str("\n\n");
            instructions.push_str(extra);
        }
        instructions
    }

    /// Run the whole session conversation for one user request.
    pub async fn run(&self, user_request: &str) -> Result<GenerateOutput, SessionError> {
        let usage = Arc::new(Mutex::new(TokenUsage::default()));

        let mut tools = self.bus.callable_tools("orchestrator");
        tools.push(Arc::new(DelegateTool {
            session_id: self.session_id.clone(),
            specialists: self.specialists.clone(),
            tasks: self.tasks.clone(),
            usage: Arc::clone(&usage),
        }));
        tools.push(Arc::new(QueryBlackboardTool {
            session_id: self.session_id.clone(),
            blackboard: self.blackboard.clone(),
        }));

        let mut output = generate_text(
            self.model.as_ref(),
            &self.instructions(),
            user_request,
            &tools,
            MAX_TURNS,
        )
        .await?;

        // fold in the tokens the specialists spent under delegation
        output.usage.add(*usage.lock());
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// delegate_task
// ---------------------------------------------------------------------------

struct DelegateTool {
    session_id: String,
    specialists: HashMap<String, Arc<Specialist>>,
    tasks: TaskStore,
    usage: Arc<Mutex<TokenUsage>>,
}

#[async_trait]
impl CallableTool for DelegateTool {
    fn name(&self) -> &str {
        "delegate_task"
    }

    fn description(&self) -> &str {
        "Delegate a task to a named specialist agent and wait for its result"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agentId": { "type": "string", "description": "Name of the specialist" },
                "task": { "type": "string", "description": "What the specialist should do" },
                "context": { "description": "Optional extra context passed along" }
            },
            "required": ["agentId", "task"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let agent_id = args
            .get("agentId")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing 'agentId'".to_string()))?
            .to_string();
        let task = args
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing 'task'".to_string()))?
            .to_string();
        let context = args.get("context").cloned();

        // Unknown agents are reported back to the model as text, with no
        // task record, so the orchestrator can correct itself.
        let Some(specialist) = self.specialists.get(&agent_id) else {
            log::warn!("delegation to unknown agent '{agent_id}'");
            return Ok(Value::String(format!(
                "Error: agent \"{agent_id}\" is not registered."
            )));
        };

        let task_id = format!("task-{}", Uuid::new_v4());
        self.tasks
            .create_task(
                &self.session_id,
                &task_id,
                Some("orchestrator"),
                &agent_id,
                &task,
                context,
            )
            .await
            .map_err(ToolError::from)?;
        self.tasks
            .update_task_status(&self.session_id, &task_id, TaskStatus::Running, None, None)
            .await
            .map_err(ToolError::from)?;

        match specialist.run(&task).await {
            Ok(output) => {
                self.usage.lock().add(output.usage);
                self.tasks
                    .update_task_status(
                        &self.session_id,
                        &task_id,
                        TaskStatus::Completed,
                        Some(Value::String(output.text.clone())),
                        None,
                    )
                    .await
                    .map_err(ToolError::from)?;
                Ok(Value::String(output.text))
            }
            Err(err) => {
                // record the failure before surfacing it; a store error
                // here must not mask the specialist's own failure
                if let Err(store_err) = self
                    .tasks
                    .update_task_status(
                        &self.session_id,
                        &task_id,
                        TaskStatus::Failed,
                        None,
                        Some(err.to_string()),
                    )
                    .await
                {
                    log::warn!("failed to mark task {task_id} failed: {store_err}");
                }
                Err(ToolError::Execution {
                    tool: "delegate_task".to_string(),
                    message: format!("specialist '{agent_id}' failed: {err}"),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// query_blackboard
// ---------------------------------------------------------------------------

struct QueryBlackboardTool {
    session_id: String,
    blackboard: Blackboard,
}

#[async_trait]
impl CallableTool for QueryBlackboardTool {
    fn name(&self) -> &str {
        "query_blackboard"
    }

    fn description(&self) -> &str {
        "Search the session blackboard for entries matching a text query"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Case-insensitive substring matched against entry values" },
                "namespace": { "type": "string", "description": "Optional exact namespace filter" }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing 'query'".to_string()))?;
        let entries = self
            .blackboard
            .search(
                &self.session_id,
                args.get("namespace").and_then(Value::as_str),
                None,
                Some(query),
            )
            .await
            .map_err(ToolError::from)?;

        let rendered: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "namespace": entry.namespace,
                    "key": entry.key,
                    "value": entry.value,
                    "agentId": entry.agent_id,
                    "updatedAt": entry.updated_at,
                })
            })
            .collect();
        Ok(json!({ "count": rendered.len(), "entries": rendered }))
    }
}
