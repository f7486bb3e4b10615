/// The delete-or-create toggle for the panel server.
use std::time::Duration;

use crate::api::compute::{self, InstanceLookup, OperationKind};
use crate::api::dns;
use crate::error::GcpError;
use crate::models::AppState;

/// Outcome of one toggle invocation
#[derive(Debug)]
pub struct ToggleOutcome {
    pub message: String,
    pub kind: OperationKind,
}

/// Toggle the panel server: delete it when present, create it when absent,
/// and on creation point the configured DNS name at its public address.
pub async fn toggle_server(state: &AppState) -> Result<ToggleOutcome, GcpError> {
    // At most one toggle in flight per process
    let _guard = state.toggle_lock.lock().await;

    let cfg = &state.config;
    let gcp = &state.gcp;

    let operation =
        match compute::get_instance(gcp, &cfg.project, &cfg.zone, &cfg.server_name).await? {
            InstanceLookup::Found(instance) => {
                tracing::info!(instance = %instance.name, "instance exists, deleting");
                compute::delete_instance(gcp, &cfg.project, &cfg.zone, &instance.name).await?
            }
            InstanceLookup::NotFound => {
                tracing::info!(instance = %cfg.server_name, "instance absent, creating");
                let startup = read_startup_script(&cfg.startup_script)?;
                compute::insert_instance(gcp, cfg, &startup).await?
            }
        };

    let done = compute::wait_for_operation(
        gcp,
        &cfg.project,
        &cfg.zone,
        &operation,
        Duration::from_secs(cfg.poll_timeout_secs),
    )
    .await?;

    let kind = done.kind();
    let message = response_message(&kind, &cfg.server_name);

    if kind == OperationKind::Insert {
        publish_dns(state).await?;
    }

    Ok(ToggleOutcome { message, kind })
}

fn response_message(kind: &OperationKind, server_name: &str) -> String {
    format!("Successfully {} {}", kind.verb(), server_name)
}

/// Re-fetch the freshly created instance and publish its NAT IP as the
/// configured A record.
async fn publish_dns(state: &AppState) -> Result<(), GcpError> {
    let cfg = &state.config;
    let instance =
        match compute::get_instance(&state.gcp, &cfg.project, &cfg.zone, &cfg.server_name).await? {
            InstanceLookup::Found(instance) => instance,
            // The create operation finished but the instance is gone again;
            // nothing to publish
            InstanceLookup::NotFound => {
                return Err(GcpError::InstanceVanished(cfg.server_name.clone()))
            }
        };

    let ip = instance
        .nat_ip()
        .ok_or_else(|| GcpError::MissingNatIp(instance.name.clone()))?
        .to_string();

    dns::replace_a_record(&state.gcp, &cfg.project, &cfg.dns_zone, &cfg.dns_name, &ip).await
}

fn read_startup_script(path: &str) -> Result<String, GcpError> {
    std::fs::read_to_string(path).map_err(|source| GcpError::StartupScript {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_message() {
        let msg = response_message(&OperationKind::Insert, "pufferpanel-server");
        assert_eq!(msg, "Successfully created pufferpanel-server");
        assert!(!msg.contains("insert"));
    }

    #[test]
    fn test_delete_message() {
        let msg = response_message(&OperationKind::Delete, "pufferpanel-server");
        assert_eq!(msg, "Successfully deleted pufferpanel-server");
    }

    #[test]
    fn test_startup_script_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("startup.sh");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        let script = read_startup_script(path.to_str().unwrap()).unwrap();
        assert_eq!(script, "#!/bin/sh\n");
    }

    #[test]
    fn test_startup_script_missing_is_an_error() {
        let err = read_startup_script("/nonexistent/startup.sh").unwrap_err();
        match err {
            GcpError::StartupScript { path, .. } => {
                assert_eq!(path, "/nonexistent/startup.sh")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
