//! Session event bridge.
//!
//! A read-only polling loop that turns durable-store state into a local
//! event stream. Consumers get eventually-consistent snapshots, not an
//! audit trail: a status that changes and reverts between polls is never
//! observed, and a burst of artifacts arrives as one batch. The bridge
//! never blocks or fails the session flow.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::blackboard::{Blackboard, ARTIFACTS_NAMESPACE};
use crate::store::DurableStore;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const CHANNEL_CAPACITY: usize = 256;

/// Event vocabulary of the session stream. The bridge itself emits only
/// `status_change` and `artifact_created`; the rest of the vocabulary is
/// carried for consumers that merge other event sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventType {
    ToolStart,
    ToolEnd,
    TaskStart,
    TaskEnd,
    StatusChange,
    ArtifactCreated,
}

/// One emitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub id: String,
    pub event_type: AgentEventType,
    pub timestamp: i64,
    pub payload: Value,
}

impl AgentEvent {
    fn new(event_type: AgentEventType, payload: Value) -> Self {
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            event_type,
            timestamp: chrono::Utc::now().timestamp_millis(),
            payload,
        }
    }
}

/// Polls the session's durable state and republishes it as events.
pub struct SessionEventBridge {
    session_id: String,
    cloud: Arc<dyn DurableStore>,
    blackboard: Blackboard,
    interval: Duration,
    sender: broadcast::Sender<AgentEvent>,
    shutdown: Option<watch::Sender<bool>>,
}

impl SessionEventBridge {
    pub fn new(
        session_id: impl Into<String>,
        cloud: Arc<dyn DurableStore>,
        blackboard: Blackboard,
    ) -> Self {
        Self::with_interval(session_id, cloud, blackboard, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        session_id: impl Into<String>,
        cloud: Arc<dyn DurableStore>,
        blackboard: Blackboard,
        interval: Duration,
    ) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            session_id: session_id.into(),
            cloud,
            blackboard,
            interval,
            sender,
            shutdown: None,
        }
    }

    /// Subscribe to the event stream. Valid before or after `connect`.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }

    /// Spawn the polling task. Idempotent; a second call is a no-op.
    pub fn connect(&mut self) {
        if self.shutdown.is_some() {
            return;
        }
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown = Some(shutdown_tx);

        let session_id = self.session_id.clone();
        let cloud = Arc::clone(&self.cloud);
        let blackboard = self.blackboard.clone();
        let interval = self.interval;
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let mut watermark = 0i64;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if let Err(err) =
                    poll_once(&session_id, &cloud, &blackboard, &sender, &mut watermark).await
                {
                    log::warn!("event bridge poll failed for session {session_id}: {err}");
                }
            }
            log::debug!("event bridge for session {session_id} stopped");
        });
    }

    /// Stop the polling task. Already-queued events remain readable.
    pub fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
    }
}

impl Drop for SessionEventBridge {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn poll_once(
    session_id: &str,
    cloud: &Arc<dyn DurableStore>,
    blackboard: &Blackboard,
    sender: &broadcast::Sender<AgentEvent>,
    watermark: &mut i64,
) -> Result<(), crate::error::StoreError> {
    if let Some(record) = cloud.get(session_id).await? {
        let status = record
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let _ = sender.send(AgentEvent::new(
            AgentEventType::StatusChange,
            json!({ "sessionId": session_id, "status": status }),
        ));
    }

    let mut artifacts = blackboard
        .get_namespace(session_id, ARTIFACTS_NAMESPACE)
        .await?;
    artifacts.retain(|entry| entry.created_at > *watermark);
    artifacts.sort_by_key(|entry| entry.created_at);
    for entry in artifacts {
        *watermark = entry.created_at;
        let _ = sender.send(AgentEvent::new(
            AgentEventType::ArtifactCreated,
            json!({
                "sessionId": session_id,
                "key": entry.key,
                "artifact": entry.value,
                "agentId": entry.agent_id,
            }),
        ));
    }
    Ok(())
}
