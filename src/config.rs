use std::env;
use std::path::Path;

use crate::error::ConfigError;

// Default configuration constants
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STARTUP_SCRIPT: &str = "startup.sh";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 300;

/// Environment variables that must be present for the toggler to run.
pub const REQUIRED_VARS: [&str; 7] = [
    "DISK_ID",
    "DNS_NAME",
    "DNS_ZONE",
    "MACHINE_TYPE",
    "SERVER_NAME",
    "GCP_PROJECT",
    "ZONE",
];

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

/// Static bearer token override for local runs (normally the token comes
/// from the metadata server).
pub fn get_access_token_override() -> Option<String> {
    env::var("GCP_ACCESS_TOKEN")
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Operating parameters for the toggle handler, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Full resource id of the persistent boot disk
    pub disk_id: String,
    /// DNS name to bind the server to (Cloud DNS FQDN form)
    pub dns_name: String,
    /// Managed zone containing `dns_name`
    pub dns_zone: String,
    /// Machine type short name, e.g. "e2-medium"
    pub machine_type: String,
    /// Compute instance name
    pub server_name: String,
    /// Project id
    pub project: String,
    /// Compute zone, e.g. "us-central1-a"
    pub zone: String,
    /// Path of the startup script embedded as instance metadata
    pub startup_script: String,
    /// Deadline for waiting on a provider operation
    pub poll_timeout_secs: u64,
}

impl Config {
    /// Build the configuration from the environment.
    ///
    /// Collects every missing required variable into a single
    /// `ConfigError::Missing` instead of failing on the first lookup, so an
    /// operator sees the full list at once. Blank values count as missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut require = |name: &str| match env::var(name) {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let disk_id = require("DISK_ID");
        let dns_name = require("DNS_NAME");
        let dns_zone = require("DNS_ZONE");
        let machine_type = require("MACHINE_TYPE");
        let server_name = require("SERVER_NAME");
        let project = require("GCP_PROJECT");
        let zone = require("ZONE");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let startup_script = env::var("STARTUP_SCRIPT")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_STARTUP_SCRIPT.to_string());
        let poll_timeout_secs = env::var("POLL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);

        Ok(Config {
            disk_id,
            dns_name,
            dns_zone,
            machine_type,
            server_name,
            project,
            zone,
            startup_script,
            poll_timeout_secs,
        })
    }
}
