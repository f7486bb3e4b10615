use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::resources::{Bucket, BucketObject, Disk, Function, IamMember, ImageLookup};

pub const AVAILABLE_MEMORY_MB: u32 = 128;
pub const FUNCTION_RUNTIME: &str = "python37";
pub const IMAGE_FAMILY: &str = "debian-10";
pub const IMAGE_PROJECT: &str = "debian-cloud";
pub const INGRESS_SETTINGS: &str = "ALLOW_ALL";
pub const INVOKER_ROLE: &str = "roles/cloudfunctions.invoker";

pub const DEFAULT_DISK_SIZE_GB: u32 = 30;
pub const DEFAULT_DISK_TYPE: &str = "pd-standard";
pub const DEFAULT_MACHINE_TYPE: &str = "e2-medium";
pub const DEFAULT_SERVER_NAME: &str = "pufferpanel-server";

/// Knobs for composing the stack. The defaults mirror a small,
/// cost-conscious panel deployment.
#[derive(Debug, Clone)]
pub struct StackParams {
    /// Prefix for resource names
    pub name: String,
    /// Domain name the panel binds to
    pub dns_name: String,
    /// Managed zone the domain falls into
    pub dns_zone: String,
    /// Compute zone for the disk and server
    pub zone: String,
    pub disk_size_gb: u32,
    pub disk_type: String,
    pub machine_type: String,
    pub server_name: String,
}

impl StackParams {
    pub fn new(name: &str, dns_name: &str, dns_zone: &str, zone: &str) -> Self {
        Self {
            name: name.to_string(),
            dns_name: dns_name.to_string(),
            dns_zone: dns_zone.to_string(),
            zone: zone.to_string(),
            disk_size_gb: DEFAULT_DISK_SIZE_GB,
            disk_type: DEFAULT_DISK_TYPE.to_string(),
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

/// One row of the manifest summary, for CLI display
#[derive(Debug, Clone)]
pub struct ResourceSummary {
    pub resource_type: String,
    pub name: String,
    pub depends_on: Vec<String>,
}

/// The composed stack: bucket → bucket object, image lookup → disk,
/// {bucket, object, disk} → function → IAM member.
///
/// Lifecycle, diffing and ordering are entirely the external engine's job;
/// this type only declares desired shape and wiring.
#[derive(Debug, Clone)]
pub struct PanelStack {
    pub bucket: Bucket,
    pub bucket_object: BucketObject,
    pub image: ImageLookup,
    pub disk: Disk,
    pub function: Function,
    pub invoker: IamMember,
}

impl PanelStack {
    pub fn new(params: &StackParams) -> Self {
        let bucket = Bucket {
            name: format!("{}-bucket", params.name),
            force_destroy: true,
        };
        let bucket_object = BucketObject {
            name: format!("{}-bucket-object", params.name),
            bucket: bucket.name.clone(),
            source: "cloud_function".to_string(),
        };
        let image = ImageLookup {
            name: format!("{}-image", params.name),
            family: IMAGE_FAMILY.to_string(),
            project: IMAGE_PROJECT.to_string(),
        };
        let disk = Disk {
            name: format!("{}-disk", params.name),
            image: format!("${{{}.name}}", image.name),
            size_gb: params.disk_size_gb,
            disk_type: params.disk_type.clone(),
        };

        // The function learns its operating parameters through env vars; the
        // disk id is a reference resolved by the engine once the disk exists.
        let mut environment_variables = BTreeMap::new();
        environment_variables.insert("DISK_ID".to_string(), format!("${{{}.id}}", disk.name));
        environment_variables.insert("DNS_NAME".to_string(), params.dns_name.clone());
        environment_variables.insert("DNS_ZONE".to_string(), params.dns_zone.clone());
        environment_variables.insert("MACHINE_TYPE".to_string(), params.machine_type.clone());
        environment_variables.insert("SERVER_NAME".to_string(), params.server_name.clone());
        environment_variables.insert("ZONE".to_string(), params.zone.clone());

        let function = Function {
            name: format!("toggle-{}", params.server_name),
            entry_point: "http".to_string(),
            runtime: FUNCTION_RUNTIME.to_string(),
            available_memory_mb: AVAILABLE_MEMORY_MB,
            max_instances: 1,
            ingress_settings: INGRESS_SETTINGS.to_string(),
            trigger_http: true,
            source_archive_bucket: bucket.name.clone(),
            source_archive_object: bucket_object.name.clone(),
            environment_variables,
        };
        let invoker = IamMember {
            name: format!("{}-toggler-public", params.name),
            cloud_function: function.name.clone(),
            role: INVOKER_ROLE.to_string(),
            member: "allUsers".to_string(),
        };

        Self {
            bucket,
            bucket_object,
            image,
            disk,
            function,
            invoker,
        }
    }

    /// Resource rows in dependency order.
    pub fn summary(&self) -> Vec<ResourceSummary> {
        vec![
            ResourceSummary {
                resource_type: "storage.Bucket".to_string(),
                name: self.bucket.name.clone(),
                depends_on: vec![],
            },
            ResourceSummary {
                resource_type: "storage.BucketObject".to_string(),
                name: self.bucket_object.name.clone(),
                depends_on: vec![self.bucket.name.clone()],
            },
            ResourceSummary {
                resource_type: "compute.ImageLookup".to_string(),
                name: self.image.name.clone(),
                depends_on: vec![],
            },
            ResourceSummary {
                resource_type: "compute.Disk".to_string(),
                name: self.disk.name.clone(),
                depends_on: vec![self.image.name.clone()],
            },
            ResourceSummary {
                resource_type: "cloudfunctions.Function".to_string(),
                name: self.function.name.clone(),
                depends_on: vec![
                    self.bucket.name.clone(),
                    self.bucket_object.name.clone(),
                    self.disk.name.clone(),
                ],
            },
            ResourceSummary {
                resource_type: "cloudfunctions.IamMember".to_string(),
                name: self.invoker.name.clone(),
                depends_on: vec![self.function.name.clone()],
            },
        ]
    }

    /// Render the desired-state manifest consumed by the external engine.
    pub fn manifest(&self) -> Value {
        let mut resources = Vec::new();
        for row in self.summary() {
            let properties = match row.resource_type.as_str() {
                "storage.Bucket" => serde_json::to_value(&self.bucket),
                "storage.BucketObject" => serde_json::to_value(&self.bucket_object),
                "compute.ImageLookup" => serde_json::to_value(&self.image),
                "compute.Disk" => serde_json::to_value(&self.disk),
                "cloudfunctions.Function" => serde_json::to_value(&self.function),
                "cloudfunctions.IamMember" => serde_json::to_value(&self.invoker),
                _ => unreachable!("summary rows cover every resource"),
            }
            .expect("resource structs serialize");
            resources.push(json!({
                "type": row.resource_type,
                "name": row.name,
                "dependsOn": row.depends_on,
                "properties": properties,
            }));
        }
        json!({ "resources": resources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> PanelStack {
        let params = StackParams::new(
            "pufferpanel",
            "panel.example.com.",
            "example-zone",
            "us-central1-a",
        );
        PanelStack::new(&params)
    }

    #[test]
    fn test_defaults_match_small_deployment() {
        let params = StackParams::new("pufferpanel", "panel.example.com.", "z", "us-central1-a");
        assert_eq!(params.disk_size_gb, 30);
        assert_eq!(params.disk_type, "pd-standard");
        assert_eq!(params.machine_type, "e2-medium");
        assert_eq!(params.server_name, "pufferpanel-server");
    }

    #[test]
    fn test_function_env_wiring() {
        let stack = stack();
        let env = &stack.function.environment_variables;
        assert_eq!(env["DNS_NAME"], "panel.example.com.");
        assert_eq!(env["DNS_ZONE"], "example-zone");
        assert_eq!(env["MACHINE_TYPE"], "e2-medium");
        assert_eq!(env["SERVER_NAME"], "pufferpanel-server");
        assert_eq!(env["ZONE"], "us-central1-a");
        // The disk id is an engine-resolved reference, not a literal
        assert_eq!(env["DISK_ID"], "${pufferpanel-disk.id}");
    }

    #[test]
    fn test_function_shape() {
        let stack = stack();
        assert_eq!(stack.function.available_memory_mb, 128);
        assert_eq!(stack.function.max_instances, 1);
        assert!(stack.function.trigger_http);
        assert_eq!(stack.function.ingress_settings, "ALLOW_ALL");
        assert_eq!(stack.function.source_archive_bucket, "pufferpanel-bucket");
        assert_eq!(
            stack.function.source_archive_object,
            "pufferpanel-bucket-object"
        );
    }

    #[test]
    fn test_invoker_grants_public_access() {
        let stack = stack();
        assert_eq!(stack.invoker.role, "roles/cloudfunctions.invoker");
        assert_eq!(stack.invoker.member, "allUsers");
        assert_eq!(stack.invoker.cloud_function, stack.function.name);
    }

    #[test]
    fn test_manifest_dependency_edges() {
        let manifest = stack().manifest();
        let resources = manifest["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 6);

        // Bucket first, invoker last
        assert_eq!(resources[0]["type"], "storage.Bucket");
        assert_eq!(resources[5]["type"], "cloudfunctions.IamMember");

        let object = &resources[1];
        assert_eq!(object["dependsOn"][0], "pufferpanel-bucket");

        let function = &resources[4];
        let deps: Vec<&str> = function["dependsOn"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            deps,
            vec![
                "pufferpanel-bucket",
                "pufferpanel-bucket-object",
                "pufferpanel-disk"
            ]
        );
    }
}
