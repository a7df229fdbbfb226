//! Model-callable tool abstraction.
//!
//! Everything a language model can invoke, bus-registered manifests and
//! the orchestrator's synthesized delegation/blackboard tools alike, is exposed
//! through this one trait. The executor hands the declarations to the
//! model and dispatches requested calls back through `call`, one at a
//! time, in request order.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// An invocable, schema-described tool.
#[async_trait]
pub trait CallableTool: Send + Sync {
    /// Identifier the model uses to request this tool.
    fn name(&self) -> &str;

    /// Description telling the model how/when/why to use the tool.
    fn description(&self) -> &str;

    /// JSON-Schema parameter declaration passed to the model.
    fn parameters(&self) -> Value;

    /// Execute the tool with already-decoded JSON arguments.
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}
