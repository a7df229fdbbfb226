//! Session bootstrap and lifecycle.

pub mod config;
pub mod manager;

pub use config::{SpecialistConfig, WorkerConfig};
pub use manager::{SessionManager, SessionStatus};
