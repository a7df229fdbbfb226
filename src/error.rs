//! Error types for the session orchestrator.
//!
//! One enum per domain, chained with `#[from]` where a layer wraps the one
//! below it. The [`SessionError`] at the top is the only error the worker
//! binary ever sees: the session manager converts every phase failure into
//! a terminal `failed` status carrying the rendered message, then returns
//! the error so the process can exit non-zero.

use thiserror::Error;

/// Errors from the durable store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched the given id or composite key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote store endpoint rejected or failed the request.
    #[error("store backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    /// Transport-level failure reaching the store.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// A record could not be encoded or decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Errors from loading or invoking tools on the bus.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A manifest is misconfigured (unknown builtin id, missing endpoint).
    /// Raised at load time; the offending manifest is skipped.
    #[error("tool configuration error: {0}")]
    Configuration(String),

    /// No tool with the requested id is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Arguments failed schema validation before execution started.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed: non-2xx HTTP response or runtime error.
    /// Always recorded to the execution log before being returned.
    #[error("tool '{tool}' execution failed: {message}")]
    Execution { tool: String, message: String },

    /// The tool type is registered but has no implementation yet.
    /// Raised at call time only (mcp tools).
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from a language model call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport-level failure reaching the model backend.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The backend returned a non-2xx response.
    #[error("model backend error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The backend returned a body this client cannot interpret.
    #[error("malformed model response: {0}")]
    Malformed(String),

    /// Streaming completions are surfaced at call time only.
    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

/// Errors from validating an execution plan's dependency graph.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A step depends on an id that is not a step of the same plan.
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// The dependency relation contains a cycle through the named step.
    #[error("dependency cycle detected through step '{step}'")]
    Cycle { step: String },
}

/// Top-level session error, produced by the session manager boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Missing session record, manifest snapshot, or agent configuration
    /// at startup. Fatal and non-retryable.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// The orchestration run itself failed in a way not covered above.
    #[error("orchestration failed: {0}")]
    Orchestration(String),
}

/// Errors from reading the worker bootstrap environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required environment variables are absent.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    /// `SUB_AGENTS` was set but is not a valid JSON array of agent configs.
    #[error("invalid SUB_AGENTS value: {0}")]
    InvalidSubAgents(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_display() {
        let err = StoreError::NotFound("task t-1".into());
        assert_eq!(err.to_string(), "not found: task t-1");
    }

    #[test]
    fn test_tool_execution_display_carries_tool_and_message() {
        let err = ToolError::Execution {
            tool: "search_web".into(),
            message: "API request failed with status 500".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("search_web"));
        assert!(rendered.contains("status 500"));
    }

    #[test]
    fn test_session_error_wraps_tool_error() {
        let err: SessionError = ToolError::Unimplemented("mcp".into()).into();
        assert!(matches!(err, SessionError::Tool(_)));
    }

    #[test]
    fn test_missing_env_lists_all_names() {
        let err = ConfigError::MissingEnv(vec!["SESSION_ID".into(), "AUTH_TOKEN".into()]);
        assert_eq!(
            err.to_string(),
            "missing required environment variables: SESSION_ID, AUTH_TOKEN"
        );
    }
}
