/// Cloud DNS record-set listing and change batches
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::GcpClient;
use crate::error::GcpError;

/// TTL published for the panel's A record.
pub const RECORD_TTL: u32 = 300;

/// A DNS resource record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: u32,
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

/// One atomic batch of record additions and deletions
#[derive(Debug, Clone, Default, Serialize)]
pub struct Change {
    pub additions: Vec<ResourceRecordSet>,
    pub deletions: Vec<ResourceRecordSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSetList {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// One wholesale replacement: delete every existing record set carrying the
/// configured name (regardless of type), add a single A record for the new
/// address. The provider applies the batch atomically.
pub fn plan_record_replacement(
    existing: &[ResourceRecordSet],
    dns_name: &str,
    ip: &str,
) -> Change {
    let deletions = existing
        .iter()
        .filter(|r| r.name == dns_name)
        .cloned()
        .collect();
    let additions = vec![ResourceRecordSet {
        name: dns_name.to_string(),
        record_type: "A".to_string(),
        ttl: RECORD_TTL,
        rrdatas: vec![ip.to_string()],
    }];
    Change {
        additions,
        deletions,
    }
}

/// List every record set in the managed zone, following page tokens.
pub async fn list_record_sets(
    gcp: &GcpClient,
    project: &str,
    managed_zone: &str,
) -> Result<Vec<ResourceRecordSet>, GcpError> {
    let base = format!(
        "{}/projects/{}/managedZones/{}/rrsets",
        gcp.dns_base_url(), project, managed_zone
    );
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page: RecordSetList = match page_token {
            Some(ref token) => {
                gcp.get_with_query(&base, &[("pageToken", token.as_str())])
                    .await?
            }
            None => gcp.get(&base).await?,
        };
        records.extend(page.rrsets);
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(records)
}

/// Submit one change batch against the managed zone.
pub async fn submit_change(
    gcp: &GcpClient,
    project: &str,
    managed_zone: &str,
    change: &Change,
) -> Result<(), GcpError> {
    let url = format!(
        "{}/projects/{}/managedZones/{}/changes",
        gcp.dns_base_url(), project, managed_zone
    );
    let body = serde_json::to_value(change).map_err(|e| GcpError::Network(e.to_string()))?;
    // The change resource echo is not interesting to the caller
    let _: Value = gcp.post(&url, &body).await?;
    Ok(())
}

/// Point `dns_name` at `ip`: list the zone, plan the wholesale replacement,
/// submit it as one batch.
pub async fn replace_a_record(
    gcp: &GcpClient,
    project: &str,
    managed_zone: &str,
    dns_name: &str,
    ip: &str,
) -> Result<(), GcpError> {
    let existing = list_record_sets(gcp, project, managed_zone).await?;
    let change = plan_record_replacement(&existing, dns_name, ip);
    tracing::info!(
        %dns_name,
        %ip,
        deletions = change.deletions.len(),
        "replacing DNS record"
    );
    submit_change(gcp, project, managed_zone, &change).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rrset(name: &str, record_type: &str, ttl: u32, data: &[&str]) -> ResourceRecordSet {
        ResourceRecordSet {
            name: name.to_string(),
            record_type: record_type.to_string(),
            ttl,
            rrdatas: data.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_replacement_deletes_only_matching_name() {
        let existing = vec![
            rrset("panel.example.com.", "A", 300, &["34.1.1.1"]),
            rrset("other.example.com.", "A", 300, &["34.2.2.2"]),
            rrset("example.com.", "NS", 21600, &["ns1.example.com."]),
        ];
        let change = plan_record_replacement(&existing, "panel.example.com.", "34.9.9.9");

        assert_eq!(change.deletions.len(), 1);
        assert_eq!(change.deletions[0].name, "panel.example.com.");
        assert_eq!(change.additions.len(), 1);
    }

    #[test]
    fn test_replacement_drops_all_types_of_the_name() {
        // A stale TXT record under the same name goes too
        let existing = vec![
            rrset("panel.example.com.", "A", 300, &["34.1.1.1"]),
            rrset("panel.example.com.", "TXT", 300, &["\"v=spf1\""]),
        ];
        let change = plan_record_replacement(&existing, "panel.example.com.", "34.9.9.9");
        assert_eq!(change.deletions.len(), 2);
    }

    #[test]
    fn test_replacement_addition_shape() {
        let change = plan_record_replacement(&[], "panel.example.com.", "34.9.9.9");

        assert!(change.deletions.is_empty());
        assert_eq!(change.additions.len(), 1);
        let added = &change.additions[0];
        assert_eq!(added.name, "panel.example.com.");
        assert_eq!(added.record_type, "A");
        assert_eq!(added.ttl, RECORD_TTL);
        assert_eq!(added.rrdatas, vec!["34.9.9.9".to_string()]);
    }

    #[test]
    fn test_change_serializes_with_both_lists() {
        let existing = vec![rrset("panel.example.com.", "A", 300, &["34.1.1.1"])];
        let change = plan_record_replacement(&existing, "panel.example.com.", "34.9.9.9");
        let value = serde_json::to_value(&change).unwrap();

        assert!(value["additions"].is_array());
        assert!(value["deletions"].is_array());
        assert_eq!(value["additions"][0]["type"], "A");
        assert_eq!(value["deletions"][0]["rrdatas"][0], "34.1.1.1");
    }
}
