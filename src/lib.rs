//! # Conclave
//!
//! A session orchestrator for LLM multi-agent work. One worker process
//! drives one session: an orchestrator agent decomposes the user request
//! and delegates to specialist agents, coordinating through a shared
//! blackboard, a schema-validated tool bus, and a durable task store. A
//! polling event bridge republishes session state as a local event
//! stream.

pub mod agents;
pub mod blackboard;
pub mod error;
pub mod events;
pub mod session;
pub mod store;
pub mod tasks;
pub mod tools;

pub use agents::{ChatModel, ModelProvider, Orchestrator, Specialist};
pub use blackboard::Blackboard;
pub use error::{ConfigError, ModelError, PlanError, SessionError, StoreError, ToolError};
pub use events::{AgentEvent, AgentEventType, SessionEventBridge};
pub use session::{SessionManager, SessionStatus, WorkerConfig};
pub use store::{DurableStore, HttpStore, MemoryStore};
pub use tasks::TaskStore;
pub use tools::{ToolBus, ToolManifest};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
