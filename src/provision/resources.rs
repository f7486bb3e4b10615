/// Desired-state shapes for the five provisioned resources.
///
/// Nothing here talks to a provider: the structs only describe what should
/// exist. The external infrastructure engine diffs the rendered manifest
/// against actual state and issues the provider calls itself.
use std::collections::BTreeMap;

use serde::Serialize;

/// Storage bucket holding the toggler source archive
#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub name: String,
    pub force_destroy: bool,
}

/// The source archive object inside the bucket
#[derive(Debug, Clone, Serialize)]
pub struct BucketObject {
    pub name: String,
    pub bucket: String,
    /// Local path of the archive uploaded by the engine
    pub source: String,
}

/// Image lookup resolved by the engine at apply time
#[derive(Debug, Clone, Serialize)]
pub struct ImageLookup {
    pub name: String,
    pub family: String,
    pub project: String,
}

/// Persistent disk the panel server boots from
#[derive(Debug, Clone, Serialize)]
pub struct Disk {
    pub name: String,
    /// Image reference, filled from the image lookup
    pub image: String,
    pub size_gb: u32,
    #[serde(rename = "type")]
    pub disk_type: String,
}

/// The serverless toggle function
#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub name: String,
    pub entry_point: String,
    pub runtime: String,
    pub available_memory_mb: u32,
    pub max_instances: u32,
    pub ingress_settings: String,
    pub trigger_http: bool,
    pub source_archive_bucket: String,
    pub source_archive_object: String,
    pub environment_variables: BTreeMap<String, String>,
}

/// IAM binding granting public invocation of the function
#[derive(Debug, Clone, Serialize)]
pub struct IamMember {
    pub name: String,
    pub cloud_function: String,
    pub role: String,
    pub member: String,
}
