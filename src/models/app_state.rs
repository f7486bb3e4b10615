use std::sync::Arc;

use crate::api::GcpClient;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gcp: Arc<GcpClient>,
    /// Serializes toggle invocations. The deployment caps concurrency at
    /// one; this keeps the process honest if the trigger layer does not.
    pub toggle_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_client(config, GcpClient::new())
    }

    /// State over a specific client, e.g. one pointed at alternate endpoints.
    pub fn with_client(config: Config, gcp: GcpClient) -> Self {
        Self {
            config,
            gcp: Arc::new(gcp),
            toggle_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}
