//! Agents: the model abstraction, the turn loop, and the two agent roles.

pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod specialist;
#[cfg(test)]
pub mod testing;

pub use executor::{generate_text, GenerateOutput, MAX_TURNS};
pub use model::{
    BackendModel, BackendProvider, ChatMessage, ChatModel, ChatOutcome, ModelProvider, TokenUsage,
    ToolCall, ToolDeclaration,
};
pub use orchestrator::Orchestrator;
pub use specialist::Specialist;
