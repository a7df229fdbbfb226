//! Tool subsystem: manifests, schema validation, built-ins, and the bus.

pub mod builtin;
pub mod bus;
pub mod callable;
pub mod manifest;
pub mod schema;

pub use builtin::{BuiltinContext, BuiltinTool};
pub use bus::ToolBus;
pub use callable::CallableTool;
pub use manifest::{CostEstimate, RateLimit, ToolManifest, ToolMetadata, ToolSchemaSpec, ToolType};
pub use schema::CompiledSchema;
