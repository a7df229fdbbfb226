//! Tool bus: the session's registry and dispatcher for callable tools.
//!
//! Built once per session from the manifest snapshot during the
//! `loading_tools` phase. Every invocation runs the same pipeline:
//! validate arguments, record a `running` execution, dispatch by kind,
//! then record exactly one terminal execution. Telemetry never blocks a
//! call; store failures while recording are logged and swallowed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::blackboard::Blackboard;
use crate::error::ToolError;
use crate::tasks::{ExecutionStatus, TaskStore, ToolExecutionRecord};

use super::builtin::{BuiltinContext, BuiltinTool};
use super::callable::CallableTool;
use super::manifest::{ToolManifest, ToolType};
use super::schema::CompiledSchema;

/// How a registered tool executes.
enum ToolKind {
    Api {
        endpoint: String,
        api_key_field: Option<String>,
    },
    Builtin(BuiltinTool),
    /// Registered so the model sees it; calls fail as unimplemented.
    Mcp,
}

/// One loaded registry entry.
struct RegisteredTool {
    name: String,
    description: String,
    parameters: Value,
    schema: CompiledSchema,
    kind: ToolKind,
    cost_per_request: f64,
}

/// Session-scoped tool registry and dispatcher.
pub struct ToolBus {
    session_id: String,
    tasks: TaskStore,
    blackboard: Blackboard,
    client: reqwest::Client,
    tools: HashMap<String, RegisteredTool>,
    total_cost: Mutex<f64>,
}

impl ToolBus {
    /// Build the registry from a manifest snapshot.
    ///
    /// Disabled manifests are skipped. A manifest that fails to load is
    /// logged and omitted; one bad tool does not sink the session.
    pub fn initialize(
        session_id: impl Into<String>,
        manifests: &[ToolManifest],
        tasks: TaskStore,
        blackboard: Blackboard,
    ) -> Self {
        let session_id = session_id.into();
        let mut tools = HashMap::new();
        for manifest in manifests {
            if !manifest.is_enabled {
                log::debug!("tool '{}' is disabled, skipping", manifest.id);
                continue;
            }
            match Self::load_tool(manifest) {
                Ok(tool) => {
                    tools.insert(manifest.id.clone(), tool);
                }
                Err(err) => {
                    log::error!("failed to load tool '{}': {err}", manifest.id);
                }
            }
        }
        log::info!(
            "tool bus ready for session {session_id}: {} of {} tools loaded",
            tools.len(),
            manifests.len()
        );
        Self {
            session_id,
            tasks,
            blackboard,
            client: reqwest::Client::new(),
            tools,
            total_cost: Mutex::new(0.0),
        }
    }

    fn load_tool(manifest: &ToolManifest) -> Result<RegisteredTool, ToolError> {
        let kind = match manifest.tool_type {
            ToolType::Api => {
                let endpoint = manifest.metadata.endpoint.clone().ok_or_else(|| {
                    ToolError::Configuration(format!(
                        "api tool '{}' has no endpoint",
                        manifest.id
                    ))
                })?;
                ToolKind::Api {
                    endpoint,
                    api_key_field: manifest.metadata.api_key_field.clone(),
                }
            }
            ToolType::Builtin => ToolKind::Builtin(BuiltinTool::from_id(&manifest.id)?),
            ToolType::Mcp => ToolKind::Mcp,
        };

        // builtins always use their canonical schemas; the manifest's
        // declaration is advisory only for them
        let parameters = match &kind {
            ToolKind::Builtin(builtin) => builtin.default_parameters(),
            _ => manifest.schema.parameters.clone().unwrap_or(Value::Null),
        };
        let schema = CompiledSchema::compile(Some(&parameters).filter(|p| !p.is_null()));

        Ok(RegisteredTool {
            name: manifest.name.clone(),
            description: manifest.description().to_string(),
            parameters,
            schema,
            kind,
            cost_per_request: manifest
                .metadata
                .cost_estimate
                .as_ref()
                .map(|estimate| estimate.per_request)
                .unwrap_or(0.0),
        })
    }

    /// Ids of all loaded tools.
    pub fn tool_ids(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Whether a tool id is registered.
    pub fn has_tool(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    /// Accumulated declared cost of successful invocations.
    pub fn total_cost(&self) -> f64 {
        *self.total_cost.lock()
    }

    /// Invoke a registered tool.
    ///
    /// Arguments are validated before any side effect. Each attempt gets a
    /// fresh execution id, a `running` record at start, and exactly one
    /// terminal record.
    pub async fn invoke(
        &self,
        tool_id: &str,
        agent_id: Option<&str>,
        args: Value,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| ToolError::NotFound(tool_id.to_string()))?;
        tool.schema.validate(&args)?;

        let execution_id = format!("exec-{}", Uuid::new_v4());
        let mut record = ToolExecutionRecord {
            session_id: self.session_id.clone(),
            execution_id,
            tool_id: tool_id.to_string(),
            tool_name: tool.name.clone(),
            status: ExecutionStatus::Running,
            input: args.clone(),
            output: None,
            error: None,
            agent_id: agent_id.map(String::from),
        };
        self.record(&record).await;

        let outcome = self.execute(tool_id, tool, agent_id, &args).await;
        match &outcome {
            Ok(output) => {
                record.status = ExecutionStatus::Success;
                record.output = Some(output.clone());
                *self.total_cost.lock() += tool.cost_per_request;
            }
            Err(err) => {
                record.status = ExecutionStatus::Error;
                record.error = Some(err.to_string());
            }
        }
        self.record(&record).await;
        outcome
    }

    async fn record(&self, record: &ToolExecutionRecord) {
        if let Err(err) = self.tasks.record_tool_execution(record).await {
            log::warn!(
                "failed to record execution {} for tool '{}': {err}",
                record.execution_id,
                record.tool_id
            );
        }
    }

    async fn execute(
        &self,
        tool_id: &str,
        tool: &RegisteredTool,
        agent_id: Option<&str>,
        args: &Value,
    ) -> Result<Value, ToolError> {
        match &tool.kind {
            ToolKind::Api {
                endpoint,
                api_key_field,
            } => self.call_api(tool_id, endpoint, api_key_field.as_deref(), args).await,
            ToolKind::Builtin(builtin) => {
                let ctx = BuiltinContext {
                    session_id: self.session_id.clone(),
                    blackboard: self.blackboard.clone(),
                };
                builtin.execute(&ctx, agent_id, args).await
            }
            ToolKind::Mcp => Err(ToolError::Unimplemented(format!(
                "mcp tool '{tool_id}' is not yet supported"
            ))),
        }
    }

    async fn call_api(
        &self,
        tool_id: &str,
        endpoint: &str,
        api_key_field: Option<&str>,
        args: &Value,
    ) -> Result<Value, ToolError> {
        let mut request = self.client.post(endpoint).json(args);
        if let Some(field) = api_key_field {
            match std::env::var(field) {
                Ok(key) => request = request.bearer_auth(key),
                Err(_) => log::warn!("api key variable '{field}' is not set for '{tool_id}'"),
            }
        }

        let response = request.send().await.map_err(|err| ToolError::Execution {
            tool: tool_id.to_string(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|err| ToolError::Execution {
            tool: tool_id.to_string(),
            message: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(ToolError::Execution {
                tool: tool_id.to_string(),
                message: format!("endpoint returned {status}: {body}"),
            });
        }
        serde_json::from_str(&body).map_err(|_| ToolError::Execution {
            tool: tool_id.to_string(),
            message: "endpoint returned non-JSON body".to_string(),
        })
    }

    /// Adapt every registered tool into the model-callable surface for one
    /// agent. The model addresses tools by manifest id.
    pub fn callable_tools(self: &Arc<Self>, agent_id: &str) -> Vec<Arc<dyn CallableTool>> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids.into_iter()
            .map(|tool_id| {
                let tool = &self.tools[&tool_id];
                Arc::new(BusTool {
                    bus: Arc::clone(self),
                    tool_id,
                    agent_id: agent_id.to_string(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                }) as Arc<dyn CallableTool>
            })
            .collect()
    }
}

/// [`CallableTool`] adapter over one bus registry entry.
struct BusTool {
    bus: Arc<ToolBus>,
    tool_id: String,
    agent_id: String,
    description: String,
    parameters: Value,
}

#[async_trait]
impl CallableTool for BusTool {
    fn name(&self) -> &str {
        &self.tool_id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        self.bus.invoke(&self.tool_id, Some(&self.agent_id), args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn bus_with(manifests: &[ToolManifest]) -> Arc<ToolBus> {
        let store: Arc<dyn crate::store::DurableStore> = Arc::new(MemoryStore::new());
        Arc::new(ToolBus::initialize(
            "s1",
            manifests,
            TaskStore::new(Arc::clone(&store)),
            Blackboard::new(store),
        ))
    }

    fn manifest(raw: Value) -> ToolManifest {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_initialize_registers_enabled_tools_once() {
        let bus = bus_with(&[manifest(json!({
            "id": "search_web",
            "name": "Web Search",
            "type": "api",
            "metadata": { "endpoint": "http://tools.invalid/search" }
        }))]);
        assert_eq!(bus.tool_ids(), vec!["search_web"]);
    }

    #[test]
    fn test_disabled_manifest_is_skipped() {
        let bus = bus_with(&[manifest(json!({
            "id": "search_web",
            "name": "Web Search",
            "type": "api",
            "metadata": { "endpoint": "http://tools.invalid/search" },
            "isEnabled": false
        }))]);
        assert!(!bus.has_tool("search_web"));
    }

    #[test]
    fn test_unknown_builtin_fails_at_load_time() {
        let bus = bus_with(&[manifest(json!({
            "id": "frobnicate",
            "name": "Frobnicator",
            "type": "builtin"
        }))]);
        // the bad manifest is omitted, not registered-but-broken
        assert!(!bus.has_tool("frobnicate"));
    }

    #[test]
    fn test_api_tool_without_endpoint_fails_at_load_time() {
        let bus = bus_with(&[manifest(json!({
            "id": "search_web",
            "name": "Web Search",
            "type": "api"
        }))]);
        assert!(!bus.has_tool("search_web"));
    }

    #[tokio::test]
    async fn test_mcp_tool_registers_but_fails_at_call_time() {
        let bus = bus_with(&[manifest(json!({
            "id": "notes",
            "name": "Notes",
            "type": "mcp"
        }))]);
        assert!(bus.has_tool("notes"));

        let err = bus.invoke("notes", None, json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Unimplemented(_)));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool_is_not_found() {
        let bus = bus_with(&[]);
        let err = bus.invoke("ghost", None, json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_before_execution() {
        let bus = bus_with(&[manifest(json!({
            "id": "execute_code",
            "name": "Code Runner",
            "type": "builtin"
        }))]);
        let err = bus
            .invoke("execute_code", None, json!({"code": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_builtin_invocation_records_success_and_cost() {
        let store: Arc<dyn crate::store::DurableStore> = Arc::new(MemoryStore::new());
        let tasks = TaskStore::new(Arc::clone(&store));
        let bus = ToolBus::initialize(
            "s1",
            &[manifest(json!({
                "id": "execute_code",
                "name": "Code Runner",
                "type": "builtin",
                "metadata": { "costEstimate": { "perRequest": 0.01, "currency": "USD" } }
            }))],
            tasks,
            Blackboard::new(Arc::clone(&store)),
        );

        let out = bus
            .invoke("execute_code", Some("researcher"), json!({"code": "1 + 1"}))
            .await
            .unwrap();
        assert_eq!(out["exitCode"], 0);
        assert!((bus.total_cost() - 0.01).abs() < f64::EPSILON);

        let records = store
            .query(crate::tasks::EXECUTIONS_TABLE)
            .eq("sessionId", "s1")
            .collect()
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], "success");
        assert_eq!(records[0]["toolId"], "execute_code");
        assert_eq!(records[0]["agentId"], "researcher");
        assert!(records[0]["startTime"].is_i64());
        assert!(records[0]["endTime"].is_i64());
    }

    #[tokio::test]
    async fn test_failed_invocation_does_not_accrue_cost() {
        let bus = bus_with(&[manifest(json!({
            "id": "notes",
            "name": "Notes",
            "type": "mcp",
            "metadata": { "costEstimate": { "perRequest": 0.5, "currency": "USD" } }
        }))]);
        let _ = bus.invoke("notes", None, json!({})).await;
        assert_eq!(bus.total_cost(), 0.0);
    }

    #[tokio::test]
    async fn test_callable_adapter_uses_manifest_id_as_name() {
        let bus = bus_with(&[manifest(json!({
            "id": "generate_document",
            "name": "Document Generator",
            "type": "builtin"
        }))]);
        let tools = bus.callable_tools("writer");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "generate_document");
        assert_eq!(tools[0].parameters()["required"][0], "title");

        let out = tools[0]
            .call(json!({"title": "T", "content": "C"}))
            .await
            .unwrap();
        assert_eq!(out["status"], "created");
    }
}
