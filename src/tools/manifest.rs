//! Tool manifest wire types.
//!
//! A manifest declaratively describes one callable capability. Manifests
//! arrive as a snapshot on the session record, are compiled into the bus
//! registry at startup, and are never mutated at runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Closed set of tool kinds. Dispatch on this enum decides the loader:
/// `api` and `builtin` produce working calls, `mcp` registers but fails
/// lazily at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    /// Remote HTTP endpoint invoked with a single JSON POST.
    Api,
    /// MCP server reference; registered but unimplemented at call time.
    Mcp,
    /// One of the fixed built-in behaviors, selected by manifest id.
    Builtin,
}

/// Parameter schema block of a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchemaSpec {
    /// Human description the model sees.
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-Schema subset for arguments (`object`/`properties`/`required`).
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Optional description of the return shape.
    #[serde(default)]
    pub returns: Option<Value>,
    /// Optional call examples.
    #[serde(default)]
    pub examples: Option<Value>,
}

/// Declared rate limit. Carried on the manifest; not enforced by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub requests_per_minute: u32,
    pub burst: u32,
}

/// Per-request cost estimate, accumulated into session final metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub per_request: f64,
    pub currency: String,
}

/// Loader metadata block of a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    #[serde(default)]
    pub description: Option<String>,
    /// Target URL for `api` tools.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer token for
    /// `api` tools. The value is read at call time, never stored.
    #[serde(default)]
    pub api_key_field: Option<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
    #[serde(default)]
    pub cost_estimate: Option<CostEstimate>,
    /// Forward-compatible passthrough for unrecognized metadata keys.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Declarative description of one callable capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    #[serde(default)]
    pub schema: ToolSchemaSpec,
    #[serde(default)]
    pub metadata: ToolMetadata,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

impl ToolManifest {
    /// The description shown to the model: schema description, then
    /// metadata description, then the display name.
    pub fn description(&self) -> &str {
        self.schema
            .description
            .as_deref()
            .or(self.metadata.description.as_deref())
            .unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_deserializes_wire_shape() {
        let manifest: ToolManifest = serde_json::from_value(json!({
            "id": "search_web",
            "name": "Web Search",
            "version": "1.2.0",
            "type": "api",
            "schema": {
                "description": "Search the web",
                "parameters": {
                    "type": "object",
                    "properties": { "query": { "type": "string" } },
                    "required": ["query"]
                }
            },
            "metadata": {
                "endpoint": "https://tools.example.com/search",
                "apiKeyField": "SEARCH_API_KEY",
                "rateLimit": { "requestsPerMinute": 60, "burst": 10 },
                "costEstimate": { "perRequest": 0.002, "currency": "USD" },
                "region": "us-east"
            },
            "isEnabled": true,
            "isPublic": false
        }))
        .unwrap();

        assert_eq!(manifest.id, "search_web");
        assert_eq!(manifest.tool_type, ToolType::Api);
        assert_eq!(
            manifest.metadata.api_key_field.as_deref(),
            Some("SEARCH_API_KEY")
        );
        assert_eq!(manifest.metadata.rate_limit.unwrap().requests_per_minute, 60);
        assert_eq!(manifest.metadata.cost_estimate.as_ref().unwrap().per_request, 0.002);
        assert_eq!(manifest.metadata.extra["region"], "us-east");
        assert_eq!(manifest.description(), "Search the web");
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest: ToolManifest = serde_json::from_value(json!({
            "id": "notes",
            "name": "Notes",
            "type": "mcp"
        }))
        .unwrap();

        assert!(manifest.is_enabled);
        assert!(!manifest.is_public);
        assert!(manifest.schema.parameters.is_none());
        assert_eq!(manifest.description(), "Notes");
    }

    #[test]
    fn test_unknown_tool_type_is_rejected() {
        let result: Result<ToolManifest, _> = serde_json::from_value(json!({
            "id": "x", "name": "x", "type": "grpc"
        }));
        assert!(result.is_err());
    }
}
