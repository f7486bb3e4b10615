/// Error types for configuration and Google Cloud API calls
use thiserror::Error;

/// Errors raised while assembling runtime configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required environment variables are unset or blank
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Errors that can occur while talking to the Google Cloud APIs
#[derive(Debug, Error)]
pub enum GcpError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(String),

    /// An access token could not be obtained
    #[error("Auth error: {0}")]
    Auth(String),

    /// The provider answered with a non-success HTTP status
    #[error("GCP API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code returned by the provider
        status: u16,
        /// Response body, verbatim
        message: String,
    },

    /// A completed operation carried an error payload
    #[error("Operation {operation} finished with error: {detail}")]
    OperationFailed { operation: String, detail: String },

    /// The operation did not complete before the polling deadline
    #[error("Operation {operation} still pending after {waited_secs}s")]
    OperationPending { operation: String, waited_secs: u64 },

    /// The created instance exposes no NAT IP to publish
    #[error("Instance {0} has no NAT IP on its first network interface")]
    MissingNatIp(String),

    /// The instance could not be re-fetched after its create completed
    #[error("Instance {0} disappeared before its address could be published")]
    InstanceVanished(String),

    /// The startup script file could not be read
    #[error("Failed to read startup script {path}: {source}")]
    StartupScript {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
