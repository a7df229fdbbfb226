//! Worker bootstrap configuration.
//!
//! Everything the worker needs arrives through environment variables set
//! by whoever spawned the process. Missing required variables produce one
//! diagnostic naming all of them, so a misconfigured launcher is fixed in
//! one round trip.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_USER_ID: &str = "anonymous";
pub const DEFAULT_LOCAL_STORE_URL: &str = "http://localhost:3210";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3010";
pub const DEFAULT_AGENT_MODEL: &str = "gpt-4o";

/// Declarative configuration of one specialist, as carried in the
/// `SUB_AGENTS` JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistConfig {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub instructions: String,
    /// Bus tool ids this specialist may call. Empty means none.
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Fully resolved worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub session_id: String,
    pub workspace_id: String,
    pub user_id: String,
    pub user_request: String,
    pub auth_token: String,
    pub cloud_store_url: String,
    pub local_store_url: String,
    pub backend_url: String,
    pub agent_model: String,
    pub agent_instructions: Option<String>,
    pub sub_agents: Vec<SpecialistConfig>,
}

impl WorkerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration from an arbitrary lookup. Seam for tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut required = |name: &str| match lookup(name) {
            Some(value) if !value.is_empty() => value,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let session_id = required("SESSION_ID");
        let workspace_id = required("WORKSPACE_ID");
        let cloud_store_url = required("CONVEX_URL");
        let user_request = required("USER_REQUEST");
        let auth_token = required("AUTH_TOKEN");
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }

        let sub_agents = match lookup("SUB_AGENTS") {
            Some(raw) => serde_json::from_str(&raw).map_err(ConfigError::InvalidSubAgents)?,
            None => default_sub_agents(),
        };

        Ok(Self {
            session_id,
            workspace_id,
            user_id: lookup("USER_ID").unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            user_request,
            auth_token,
            cloud_store_url,
            local_store_url: lookup("LOCAL_CONVEX_URL")
                .unwrap_or_else(|| DEFAULT_LOCAL_STORE_URL.to_string()),
            backend_url: lookup("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            agent_model: lookup("AGENT_MODEL").unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_string()),
            agent_instructions: lookup("AGENT_INSTRUCTIONS"),
            sub_agents,
        })
    }

    /// Log the resolved configuration. The auth token is reported only as
    /// present or absent.
    pub fn log_summary(&self) {
        log::info!(
            "worker config: session={} workspace={} user={} model={} backend={} \
             cloud_store={} local_store={} auth_token_present={} sub_agents={}",
            self.session_id,
            self.workspace_id,
            self.user_id,
            self.agent_model,
            self.backend_url,
            self.cloud_store_url,
            self.local_store_url,
            !self.auth_token.is_empty(),
            self.sub_agents.len(),
        );
    }
}

fn default_sub_agents() -> Vec<SpecialistConfig> {
    vec![
        SpecialistConfig {
            name: "researcher".to_string(),
            model: None,
            instructions: "You are a research specialist. Gather accurate, relevant \
                           information for the task you are given and record findings \
                           on the blackboard."
                .to_string(),
            tools: Vec::new(),
        },
        SpecialistConfig {
            name: "writer".to_string(),
            model: None,
            instructions: "You are a writing specialist. Turn gathered findings into \
                           clear, well-structured documents."
                .to_string(),
            tools: Vec::new(),
        },
    ]
}
