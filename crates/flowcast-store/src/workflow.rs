use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use flowcast_types::{Outcome, Role, StatusMetadata, Tier, WorkflowMapping};
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct WorkflowFileStatus {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    tier: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WorkflowFile {
    #[serde(default)]
    mapping: HashMap<String, WorkflowFileStatus>,
    #[serde(default)]
    resolutions: HashMap<String, String>,
    #[serde(default, rename = "statusOrder")]
    status_order: Vec<String>,
    #[serde(default, rename = "commitmentPoint")]
    commitment_point: Option<String>,
    #[serde(default, rename = "discoveryCutoff")]
    discovery_cutoff: Option<DateTime<Utc>>,
}

/// Load `<dir>/<source_id>_workflow.json` (§6). A missing file yields an
/// empty mapping — every status then falls back to `Tier::Unknown` /
/// `Role::Unknown` rather than failing the request.
pub fn load_workflow_mapping(dir: &Path, source_id: &str) -> Result<WorkflowMapping> {
    let path = dir.join(format!("{source_id}_workflow.json"));
    if !path.exists() {
        return Ok(WorkflowMapping::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let file: WorkflowFile = serde_json::from_str(&content).map_err(|e| {
        crate::error::Error::Config(format!("malformed workflow file {}: {e}", path.display()))
    })?;

    let mut mapping = WorkflowMapping::default();
    for (status_name, entry) in file.mapping {
        let display_name = entry.name.clone().unwrap_or_else(|| status_name.clone());
        let metadata = StatusMetadata {
            tier: Tier::parse(&entry.tier),
            role: Role::parse(&entry.role),
            outcome: Outcome::parse(&entry.outcome),
            name: display_name,
        };
        mapping.insert(entry.id.as_deref(), &status_name, metadata);
    }

    mapping.resolutions = file
        .resolutions
        .into_iter()
        .map(|(k, v)| (k, Outcome::parse(&v)))
        .collect();
    mapping.status_order = file.status_order;
    mapping.commitment_point = file.commitment_point;
    mapping.discovery_cutoff = file.discovery_cutoff;

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_workflow_file_is_empty_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mapping = load_workflow_mapping(dir.path(), "proj").unwrap();
        assert!(mapping.by_id.is_empty());
        assert!(mapping.by_name.is_empty());
    }

    #[test]
    fn parses_mapping_resolutions_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proj_workflow.json");
        std::fs::write(
            &path,
            r#"{
                "mapping": {
                    "In Progress": {"id": "3", "tier": "downstream", "role": "active"},
                    "Done": {"id": "10001", "tier": "finished", "role": "terminal", "outcome": "delivered"}
                },
                "resolutions": {"Fixed": "delivered", "Won't Fix": "abandoned"},
                "statusOrder": ["Backlog", "In Progress", "Done"],
                "commitmentPoint": "In Progress"
            }"#,
        )
        .unwrap();

        let mapping = load_workflow_mapping(dir.path(), "proj").unwrap();
        assert_eq!(mapping.by_id.get("3").unwrap().tier, Tier::Downstream);
        assert_eq!(mapping.by_name.get("done").unwrap().outcome, Outcome::Delivered);
        assert_eq!(mapping.resolutions.get("Fixed"), Some(&Outcome::Delivered));
        assert_eq!(mapping.commitment_point.as_deref(), Some("In Progress"));
        assert_eq!(mapping.status_order.len(), 3);
    }
}
