//! Session lifecycle state machine.
//!
//! One `SessionManager` drives one session end to end through the fixed
//! phase order. Any phase failure transitions to the absorbing `failed`
//! state and aborts the remaining phases; a session is never resumed.
//! Status pushes to the cloud record are best-effort; the in-process cell
//! is authoritative.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::{ModelProvider, Orchestrator, Specialist};
use crate::blackboard::{Blackboard, ARTIFACTS_NAMESPACE};
use crate::error::SessionError;
use crate::store::DurableStore;
use crate::tasks::TaskStore;
use crate::tools::{ToolBus, ToolManifest};

use super::config::WorkerConfig;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    LoadingTools,
    Running,
    Completing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Initializing => 0,
            SessionStatus::LoadingTools => 1,
            SessionStatus::Running => 2,
            SessionStatus::Completing => 3,
            SessionStatus::Completed => 4,
            SessionStatus::Failed => 5,
        }
    }

    /// Whether `self -> to` is a legal move: one step forward along the
    /// happy path, or into `failed` from any non-terminal state.
    pub fn can_transition(&self, to: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == SessionStatus::Failed {
            return true;
        }
        to.rank() == self.rank() + 1
    }
}

/// Drives one session through its phases.
pub struct SessionManager {
    config: WorkerConfig,
    cloud: Arc<dyn DurableStore>,
    provider: Arc<dyn ModelProvider>,
    tasks: TaskStore,
    blackboard: Blackboard,
    status: RwLock<SessionStatus>,
}

impl SessionManager {
    /// `cloud` holds the session record; `local` backs the blackboard and
    /// task/telemetry tables.
    pub fn new(
        config: WorkerConfig,
        cloud: Arc<dyn DurableStore>,
        local: Arc<dyn DurableStore>,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            config,
            cloud,
            provider,
            tasks: TaskStore::new(Arc::clone(&local)),
            blackboard: Blackboard::new(local),
            status: RwLock::new(SessionStatus::Initializing),
        }
    }

    /// Current in-process status.
    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    /// Run the session to a terminal state. On error the session is left
    /// `failed` with the message pushed to the cloud record, and the error
    /// is returned so the worker can exit non-zero.
    pub async fn start(&self) -> Result<(), SessionError> {
        match self.run_phases().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail(&err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn run_phases(&self) -> Result<(), SessionError> {
        let session_id = &self.config.session_id;
        self.push_status(SessionStatus::Initializing, None).await;

        // loading_tools
        self.transition(SessionStatus::LoadingTools).await?;
        let record = self
            .cloud
            .get(session_id)
            .await?
            .ok_or_else(|| SessionError::Configuration(format!("session {session_id} not found")))?;
        let manifests: Vec<ToolManifest> = match record.get("toolManifests") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|err| {
                SessionError::Configuration(format!("invalid toolManifests: {err}"))
            })?,
            None => {
                return Err(SessionError::Configuration(format!(
                    "session {session_id} has no toolManifests"
                )))
            }
        };
        let bus = Arc::new(ToolBus::initialize(
            session_id.clone(),
            &manifests,
            self.tasks.clone(),
            self.blackboard.clone(),
        ));

        let orchestrator = self.build_orchestrator(&bus);

        // running
        self.transition(SessionStatus::Running).await?;
        let output = orchestrator.run(&self.config.user_request).await?;

        // completing: harvest artifacts and patch final metadata
        self.transition(SessionStatus::Completing).await?;
        let artifacts: Vec<Value> = self
            .blackboard
            .get_namespace(session_id, ARTIFACTS_NAMESPACE)
            .await?
            .into_iter()
            .map(|entry| project_artifact(&entry.value))
            .collect();
        self.cloud
            .patch(
                session_id,
                json!({
                    "artifacts": artifacts,
                    "finalMetadata": {
                        "totalTokensUsed": output.usage.total_tokens,
                        "totalCost": bus.total_cost(),
                        "resultSummary": output.text,
                    },
                }),
            )
            .await?;

        self.transition(SessionStatus::Completed).await?;
        log::info!("session {session_id} completed");
        Ok(())
    }

    fn build_orchestrator(&self, bus: &Arc<ToolBus>) -> Orchestrator {
        let specialists = self
            .config
            .sub_agents
            .iter()
            .map(|spec| {
                let model = self
                    .provider
                    .model(spec.model.as_deref().unwrap_or(&self.config.agent_model));
                let tools = bus
                    .callable_tools(&spec.name)
                    .into_iter()
                    .filter(|tool| spec.tools.iter().any(|id| id == tool.name()))
                    .collect();
                (
                    spec.name.clone(),
                    Arc::new(Specialist::new(
                        spec.name.clone(),
                        spec.instructions.clone(),
                        model,
                        tools,
                    )),
                )
            })
            .collect();

        Orchestrator::new(
            self.config.session_id.clone(),
            self.provider.model(&self.config.agent_model),
            specialists,
            self.tasks.clone(),
            self.blackboard.clone(),
            Arc::clone(bus),
        )
        .with_extra_instructions(self.config.agent_instructions.clone())
    }

    async fn transition(&self, to: SessionStatus) -> Result<(), SessionError> {
        {
            let mut status = self.status.write();
            if !status.can_transition(to) {
                return Err(SessionError::Orchestration(format!(
                    "illegal status transition {:?} -> {to:?}",
                    *status
                )));
            }
            *status = to;
        }
        self.push_status(to, None).await;
        Ok(())
    }

    async fn fail(&self, message: &str) {
        {
            let mut status = self.status.write();
            if status.can_transition(SessionStatus::Failed) {
                *status = SessionStatus::Failed;
            }
        }
        log::error!("session {} failed: {message}", self.config.session_id);
        self.push_status(SessionStatus::Failed, Some(message)).await;
    }

    /// Push a status onto the cloud session record. Best-effort; a store
    /// failure here never changes the session outcome.
    async fn push_status(&self, status: SessionStatus, error: Option<&str>) {
        let mut patch = json!({
            "status": status,
            "updatedAt": chrono::Utc::now().timestamp_millis(),
        });
        if let Some(message) = error {
            patch["error"] = Value::from(message);
        }
        if let Err(err) = self.cloud.patch(&self.config.session_id, patch).await {
            log::warn!(
                "failed to push status {status:?} for session {}: {err}",
                self.config.session_id
            );
        }
    }
}

/// Shape an artifact for the cloud session record. Only the contractual
/// fields survive; anything else an agent staged alongside them stays on
/// the blackboard.
fn project_artifact(value: &Value) -> Value {
    let field = |name: &str| value.get(name).cloned().unwrap_or(Value::Null);
    json!({
        "type": field("type"),
        "title": field("title"),
        "content": field("content"),
        "metadata": field("metadata"),
    })
}
