/// Compute Engine instance and operation calls
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};

use super::client::GcpClient;
use crate::config::Config;
use crate::error::GcpError;

/// Poll schedule for zone operations: start at one second, double each
/// round, never wait longer than the cap between polls.
pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// OAuth scopes granted to the instance's default service account.
/// The restricted set the panel server needs, nothing broader.
const SERVICE_ACCOUNT_SCOPES: [&str; 6] = [
    "https://www.googleapis.com/auth/devstorage.read_only",
    "https://www.googleapis.com/auth/logging.write",
    "https://www.googleapis.com/auth/monitoring.write",
    "https://www.googleapis.com/auth/servicecontrol",
    "https://www.googleapis.com/auth/service.management.readonly",
    "https://www.googleapis.com/auth/trace.append",
];

/// A compute instance as returned by the provider
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    #[serde(rename = "natIP", default)]
    pub nat_ip: Option<String>,
}

impl Instance {
    /// First NAT IP on the first network interface, if one was assigned.
    pub fn nat_ip(&self) -> Option<&str> {
        self.network_interfaces
            .first()?
            .access_configs
            .first()?
            .nat_ip
            .as_deref()
    }
}

/// Result of looking up the named instance.
///
/// "Not found" is an expected outcome that drives the create branch, so it
/// is modeled here rather than as an error to catch.
#[derive(Debug)]
pub enum InstanceLookup {
    Found(Instance),
    NotFound,
}

/// An asynchronous operation handle returned by insert/delete calls
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub operation_type: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error: Option<OperationErrorPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationErrorPayload {
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    pub fn kind(&self) -> OperationKind {
        OperationKind::parse(self.operation_type.as_deref().unwrap_or_default())
    }
}

fn render_operation_error(payload: &OperationErrorPayload) -> String {
    if payload.errors.is_empty() {
        return "unspecified provider error".to_string();
    }
    payload
        .errors
        .iter()
        .map(|e| {
            format!(
                "{}: {}",
                e.code.as_deref().unwrap_or("UNKNOWN"),
                e.message.as_deref().unwrap_or("(no message)")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Kinds of operation the toggler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Delete,
    Other(String),
}

impl OperationKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "insert" => OperationKind::Insert,
            "delete" => OperationKind::Delete,
            other => OperationKind::Other(other.to_string()),
        }
    }

    /// Human verb for the response message. An explicit mapping, not a
    /// substring rewrite of the provider's operation type.
    pub fn verb(&self) -> &str {
        match self {
            OperationKind::Insert => "created",
            OperationKind::Delete => "deleted",
            OperationKind::Other(raw) => raw.as_str(),
        }
    }
}

/// Fetch the named instance, distinguishing "not found" from real failures.
pub async fn get_instance(
    gcp: &GcpClient,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<InstanceLookup, GcpError> {
    let url = format!(
        "{}/projects/{}/zones/{}/instances/{}",
        gcp.compute_base_url(), project, zone, name
    );
    match gcp.get::<Instance>(&url).await {
        Ok(instance) => Ok(InstanceLookup::Found(instance)),
        Err(GcpError::Api { status: 404, .. }) => Ok(InstanceLookup::NotFound),
        Err(e) => Err(e),
    }
}

/// Request body for creating the panel server instance.
///
/// The fixed template: attach the persistent disk as a non-auto-delete boot
/// disk, one NAT'd interface on the default network, the restricted scope
/// set, the startup script as metadata, preemptible scheduling and shielded
/// VM options enabled.
pub fn instance_config(cfg: &Config, startup_script: &str) -> Value {
    json!({
        "name": cfg.server_name,
        "machineType": format!("zones/{}/machineTypes/{}", cfg.zone, cfg.machine_type),
        "disks": [{
            "autoDelete": false,
            "boot": true,
            "source": cfg.disk_id,
        }],
        "networkInterfaces": [{
            "network": "global/networks/default",
            "accessConfigs": [{"type": "ONE_TO_ONE_NAT", "name": "External NAT"}],
        }],
        "serviceAccounts": [{
            "email": "default",
            "scopes": SERVICE_ACCOUNT_SCOPES,
        }],
        "metadata": {
            "items": [{"key": "startup-script", "value": startup_script}],
        },
        "scheduling": {
            "preemptible": true,
        },
        "shieldedInstanceConfig": {
            "enableIntegrityMonitoring": true,
            "enableSecureBoot": true,
            "enableVtpm": true,
        },
    })
}

pub async fn insert_instance(
    gcp: &GcpClient,
    cfg: &Config,
    startup_script: &str,
) -> Result<Operation, GcpError> {
    let url = format!(
        "{}/projects/{}/zones/{}/instances",
        gcp.compute_base_url(), cfg.project, cfg.zone
    );
    let body = instance_config(cfg, startup_script);
    gcp.post(&url, &body).await
}

pub async fn delete_instance(
    gcp: &GcpClient,
    project: &str,
    zone: &str,
    name: &str,
) -> Result<Operation, GcpError> {
    let url = format!(
        "{}/projects/{}/zones/{}/instances/{}",
        gcp.compute_base_url(), project, zone, name
    );
    gcp.delete(&url).await
}

pub async fn get_zone_operation(
    gcp: &GcpClient,
    project: &str,
    zone: &str,
    operation: &str,
) -> Result<Operation, GcpError> {
    let url = format!(
        "{}/projects/{}/zones/{}/operations/{}",
        gcp.compute_base_url(), project, zone, operation
    );
    gcp.get(&url).await
}

/// Next delay in the poll schedule: doubles each round, capped.
pub fn next_poll_delay(current: Duration) -> Duration {
    (current * 2).min(MAX_POLL_INTERVAL)
}

/// Poll a zone operation until it reports DONE.
///
/// A completed operation carrying an error payload fails immediately with
/// `GcpError::OperationFailed`. The wait is bounded: once `timeout` elapses
/// the distinguishable `GcpError::OperationPending` is returned instead of
/// blocking forever.
pub async fn wait_for_operation(
    gcp: &GcpClient,
    project: &str,
    zone: &str,
    operation: &Operation,
    timeout: Duration,
) -> Result<Operation, GcpError> {
    let started = Instant::now();
    let mut delay = INITIAL_POLL_INTERVAL;

    loop {
        let result = get_zone_operation(gcp, project, zone, &operation.name).await?;

        if result.is_done() {
            if let Some(ref payload) = result.error {
                return Err(GcpError::OperationFailed {
                    operation: result.name.clone(),
                    detail: render_operation_error(payload),
                });
            }
            return Ok(result);
        }

        if started.elapsed() + delay > timeout {
            return Err(GcpError::OperationPending {
                operation: operation.name.clone(),
                waited_secs: started.elapsed().as_secs(),
            });
        }

        tracing::debug!(
            operation = %operation.name,
            status = %result.status,
            delay_secs = delay.as_secs(),
            "operation not done yet, polling again"
        );
        tokio::time::sleep(delay).await;
        delay = next_poll_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            disk_id: "projects/p/zones/us-central1-a/disks/pufferpanel-disk".into(),
            dns_name: "panel.example.com.".into(),
            dns_zone: "example-zone".into(),
            machine_type: "e2-medium".into(),
            server_name: "pufferpanel-server".into(),
            project: "p".into(),
            zone: "us-central1-a".into(),
            startup_script: "startup.sh".into(),
            poll_timeout_secs: 300,
        }
    }

    #[test]
    fn test_operation_kind_verbs() {
        assert_eq!(OperationKind::parse("insert").verb(), "created");
        assert_eq!(OperationKind::parse("delete").verb(), "deleted");
        // Unknown kinds surface the raw provider string untouched
        assert_eq!(OperationKind::parse("reset").verb(), "reset");
    }

    #[test]
    fn test_operation_kind_parse_is_exact() {
        // "bulkInsert" contains "insert" but is not a create
        assert_eq!(
            OperationKind::parse("bulkInsert"),
            OperationKind::Other("bulkInsert".to_string())
        );
    }

    #[test]
    fn test_next_poll_delay_doubles_and_caps() {
        let mut delay = INITIAL_POLL_INTERVAL;
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(delay.as_secs());
            delay = next_poll_delay(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_instance_config_template() {
        let cfg = test_config();
        let body = instance_config(&cfg, "#!/bin/sh\necho hi\n");

        assert_eq!(body["name"], "pufferpanel-server");
        assert_eq!(
            body["machineType"],
            "zones/us-central1-a/machineTypes/e2-medium"
        );
        let disk = &body["disks"][0];
        assert_eq!(disk["autoDelete"], false);
        assert_eq!(disk["boot"], true);
        assert_eq!(
            disk["source"],
            "projects/p/zones/us-central1-a/disks/pufferpanel-disk"
        );
        assert_eq!(
            body["networkInterfaces"][0]["accessConfigs"][0]["type"],
            "ONE_TO_ONE_NAT"
        );
        assert_eq!(body["scheduling"]["preemptible"], true);
        assert_eq!(body["shieldedInstanceConfig"]["enableSecureBoot"], true);
        assert_eq!(body["shieldedInstanceConfig"]["enableVtpm"], true);
        assert_eq!(
            body["shieldedInstanceConfig"]["enableIntegrityMonitoring"],
            true
        );
        assert_eq!(
            body["serviceAccounts"][0]["scopes"].as_array().unwrap().len(),
            6
        );
        assert_eq!(
            body["metadata"]["items"][0]["key"],
            "startup-script"
        );
        assert_eq!(
            body["metadata"]["items"][0]["value"],
            "#!/bin/sh\necho hi\n"
        );
    }

    #[test]
    fn test_nat_ip_extraction() {
        let instance: Instance = serde_json::from_value(json!({
            "name": "pufferpanel-server",
            "status": "RUNNING",
            "networkInterfaces": [{
                "accessConfigs": [{"type": "ONE_TO_ONE_NAT", "natIP": "34.1.2.3"}]
            }]
        }))
        .unwrap();
        assert_eq!(instance.nat_ip(), Some("34.1.2.3"));
    }

    #[test]
    fn test_nat_ip_absent() {
        let instance: Instance = serde_json::from_value(json!({
            "name": "pufferpanel-server",
            "networkInterfaces": [{"accessConfigs": []}]
        }))
        .unwrap();
        assert_eq!(instance.nat_ip(), None);

        let bare: Instance =
            serde_json::from_value(json!({"name": "pufferpanel-server"})).unwrap();
        assert_eq!(bare.nat_ip(), None);
    }

    #[test]
    fn test_operation_error_payload_parsing() {
        let op: Operation = serde_json::from_value(json!({
            "name": "operation-123",
            "operationType": "insert",
            "status": "DONE",
            "error": {"errors": [
                {"code": "QUOTA_EXCEEDED", "message": "Quota 'CPUS' exceeded"}
            ]}
        }))
        .unwrap();
        assert!(op.is_done());
        let detail = render_operation_error(op.error.as_ref().unwrap());
        assert!(detail.contains("QUOTA_EXCEEDED"));
        assert!(detail.contains("Quota 'CPUS' exceeded"));
    }

    #[test]
    fn test_pending_operation_is_not_done() {
        let op: Operation = serde_json::from_value(json!({
            "name": "operation-123",
            "operationType": "delete",
            "status": "RUNNING"
        }))
        .unwrap();
        assert!(!op.is_done());
        assert_eq!(op.kind(), OperationKind::Delete);
    }
}
