//! Task, plan, and tool-execution records.
//!
//! The delegation subsystem owns [`AgentTask`] records, the tool bus owns
//! [`ToolExecutionRecord`]s, and a planning capability owns
//! [`ExecutionPlan`]s. All three live in the durable store behind
//! [`TaskStore`], keyed by session plus a caller-supplied id.

pub mod plan;

pub use plan::{validate_plan, ExecutionPlan, PlanStatus, PlanStep};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::StoreError;
use crate::store::{record_id, DurableStore, Order};

/// Store tables.
pub const TASKS_TABLE: &str = "agentTasks";
pub const PLANS_TABLE: &str = "executionPlans";
pub const EXECUTIONS_TABLE: &str = "toolExecutions";

/// Lifecycle of a delegated task (and of a plan step).
///
/// Transitions are one-directional; `completed` and `failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One delegated task, unique per `(sessionId, taskId)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub session_id: String,
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_from: Option<String>,
    pub delegated_to: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// Telemetry status of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Error,
}

/// One tool invocation, unique per `(sessionId, executionId)`.
///
/// Recorded twice: once at start (`running`, stamps `startTime`) and once
/// with a terminal status (stamps `endTime` and computes `duration`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionRecord {
    pub session_id: String,
    pub execution_id: String,
    pub tool_id: String,
    pub tool_name: String,
    pub status: ExecutionStatus,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// Handle over the durable store for task, plan, and execution records.
#[derive(Clone)]
pub struct TaskStore {
    store: Arc<dyn DurableStore>,
}

impl TaskStore {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Insert a fresh task with status `pending`. Always inserts; task ids
    /// are the caller's responsibility.
    pub async fn create_task(
        &self,
        session_id: &str,
        task_id: &str,
        delegated_from: Option<&str>,
        delegated_to: &str,
        task: &str,
        context: Option<Value>,
    ) -> Result<String, StoreError> {
        let record = AgentTask {
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
            delegated_from: delegated_from.map(String::from),
            delegated_to: delegated_to.to_string(),
            task: task.to_string(),
            context,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        };
        self.store
            .insert(TASKS_TABLE, serde_json::to_value(&record)?)
            .await
    }

    /// Advance a task's status.
    ///
    /// Fails with [`StoreError::NotFound`] when no record matches
    /// `(session_id, task_id)`. Terminal statuses additionally stamp
    /// `completedAt` and persist `result`/`error`; non-terminal
    /// transitions update the status only.
    pub async fn update_task_status(
        &self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let record = self
            .store
            .query(TASKS_TABLE)
            .eq("sessionId", session_id)
            .eq("taskId", task_id)
            .first()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;
        let id = record_id(&record)
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id} id")))?
            .to_string();

        let mut patch = Map::new();
        patch.insert("status".to_string(), serde_json::to_value(status)?);
        if status.is_terminal() {
            patch.insert(
                "completedAt".to_string(),
                Value::from(chrono::Utc::now().timestamp_millis()),
            );
            patch.insert("result".to_string(), result.unwrap_or(Value::Null));
            patch.insert(
                "error".to_string(),
                error.map(Value::from).unwrap_or(Value::Null),
            );
        }
        self.store.patch(&id, Value::Object(patch)).await
    }

    /// Fetch one task by `(session_id, task_id)`.
    pub async fn get_task(
        &self,
        session_id: &str,
        task_id: &str,
    ) -> Result<Option<AgentTask>, StoreError> {
        let record = self
            .store
            .query(TASKS_TABLE)
            .eq("sessionId", session_id)
            .eq("taskId", task_id)
            .first()
            .await?;
        record
            .map(|r| serde_json::from_value(r).map_err(StoreError::from))
            .transpose()
    }

    /// Number of tasks recorded for a session.
    pub async fn task_count(&self, session_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .store
            .query(TASKS_TABLE)
            .eq("sessionId", session_id)
            .collect()
            .await?
            .len())
    }

    /// Upsert a plan by `(sessionId, planId)`. An existing plan has its
    /// description, steps, and status wholesale replaced; last writer
    /// wins, with no structural merge of steps.
    pub async fn save_execution_plan(&self, plan: &ExecutionPlan) -> Result<String, StoreError> {
        let existing = self
            .store
            .query(PLANS_TABLE)
            .eq("sessionId", plan.session_id.as_str())
            .eq("planId", plan.plan_id.as_str())
            .first()
            .await?;
        let now = chrono::Utc::now().timestamp_millis();

        if let Some(record) = existing {
            let id = record_id(&record)
                .ok_or_else(|| StoreError::NotFound(format!("plan {}", plan.plan_id)))?
                .to_string();
            self.store
                .patch(
                    &id,
                    json!({
                        "description": plan.description,
                        "steps": serde_json::to_value(&plan.steps)?,
                        "status": serde_json::to_value(plan.status)?,
                        "updatedAt": now,
                    }),
                )
                .await?;
            return Ok(id);
        }

        let mut record = serde_json::to_value(plan)?;
        if let Some(fields) = record.as_object_mut() {
            fields.insert("createdAt".to_string(), Value::from(now));
            fields.insert("updatedAt".to_string(), Value::from(now));
        }
        self.store.insert(PLANS_TABLE, record).await
    }

    /// The most recently created plan for a session, if any.
    pub async fn latest_execution_plan(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionPlan>, StoreError> {
        let record = self
            .store
            .query(PLANS_TABLE)
            .eq("sessionId", session_id)
            .order(Order::Desc)
            .first()
            .await?;
        record
            .map(|r| serde_json::from_value(r).map_err(StoreError::from))
            .transpose()
    }

    /// Upsert a tool-execution record by `(sessionId, executionId)`.
    ///
    /// The first call (status `running`) stamps `startTime`; a later call
    /// with a terminal status stamps `endTime` and computes
    /// `duration = endTime - startTime`.
    pub async fn record_tool_execution(
        &self,
        record: &ToolExecutionRecord,
    ) -> Result<String, StoreError> {
        let existing = self
            .store
            .query(EXECUTIONS_TABLE)
            .eq("sessionId", record.session_id.as_str())
            .eq("executionId", record.execution_id.as_str())
            .first()
            .await?;

        if let Some(stored) = existing {
            let id = record_id(&stored)
                .ok_or_else(|| StoreError::NotFound(format!("execution {}", record.execution_id)))?
                .to_string();

            let mut patch = Map::new();
            patch.insert("status".to_string(), serde_json::to_value(record.status)?);
            patch.insert(
                "output".to_string(),
                record.output.clone().unwrap_or(Value::Null),
            );
            patch.insert(
                "error".to_string(),
                record.error.clone().map(Value::from).unwrap_or(Value::Null),
            );
            if record.status != ExecutionStatus::Running {
                let end_time = chrono::Utc::now().timestamp_millis();
                patch.insert("endTime".to_string(), Value::from(end_time));
                if let Some(start_time) = stored.get("startTime").and_then(Value::as_i64) {
                    patch.insert("duration".to_string(), Value::from(end_time - start_time));
                }
            }
            self.store.patch(&id, Value::Object(patch)).await?;
            return Ok(id);
        }

        let mut fields = serde_json::to_value(record)?;
        if let Some(map) = fields.as_object_mut() {
            map.insert(
                "startTime".to_string(),
                Value::from(chrono::Utc::now().timestamp_millis()),
            );
        }
        self.store.insert(EXECUTIONS_TABLE, fields).await
    }

    /// Fetch one raw tool-execution record by `(session_id, execution_id)`.
    pub async fn get_tool_execution(
        &self,
        session_id: &str,
        execution_id: &str,
    ) -> Result<Option<Value>, StoreError> {
        self.store
            .query(EXECUTIONS_TABLE)
            .eq("sessionId", session_id)
            .eq("executionId", execution_id)
            .first()
            .await
    }
}
