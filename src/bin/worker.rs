//! Session worker.
//!
//! Spawned with one session's environment, runs that session to a
//! terminal state, and exits: 0 for `completed`, 1 for anything else.

use std::process::ExitCode;
use std::sync::Arc;

use conclave::agents::BackendProvider;
use conclave::session::{SessionManager, WorkerConfig};
use conclave::store::HttpStore;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    log::info!("conclave worker v{}", conclave::VERSION);

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    config.log_summary();

    let cloud = Arc::new(HttpStore::new(config.cloud_store_url.clone()));
    let local = Arc::new(HttpStore::new(config.local_store_url.clone()));
    let provider = Arc::new(BackendProvider::new(
        config.backend_url.clone(),
        config.auth_token.clone(),
    ));
    let session_id = config.session_id.clone();

    let manager = SessionManager::new(config, cloud, local, provider);
    match manager.start().await {
        Ok(()) => {
            log::info!("session {session_id} finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("session {session_id} failed: {err}");
            ExitCode::FAILURE
        }
    }
}
